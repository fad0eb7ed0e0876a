//! Drives one asset through script, voice and collaborator stages,
//! checkpointing the record after every transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::{
    collaborators::{CollaboratorJob, Collaborators},
    config::Settings,
    error::{Result, TubeforgeError},
    script::ScriptStage,
    store::{AssetStore, JsonFileStore},
    types::{AssetStatus, VideoAsset},
    voice::VoiceStage,
};

pub struct Orchestrator {
    script: ScriptStage,
    voice: VoiceStage,
    collaborators: Collaborators,
    store: Arc<dyn AssetStore>,
}

fn collaborator_failure(stage: &'static str, e: anyhow::Error) -> TubeforgeError {
    TubeforgeError::Collaborator {
        stage,
        reason: format!("{e:#}"),
    }
}

fn job_for(asset: &VideoAsset) -> CollaboratorJob {
    CollaboratorJob {
        asset_id: asset.id.clone(),
        topic: asset.topic.clone(),
        script_text: asset.script_text().unwrap_or_default().to_string(),
        audio_file: asset.audio_file.clone().unwrap_or_default(),
        video_file: asset.video_file.clone(),
        thumbnail_file: asset.thumbnail_file.clone(),
    }
}

impl Orchestrator {
    pub fn new(
        script: ScriptStage,
        voice: VoiceStage,
        collaborators: Collaborators,
        store: Arc<dyn AssetStore>,
    ) -> Self {
        Self {
            script,
            voice,
            collaborators,
            store,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            ScriptStage::from_settings(settings),
            VoiceStage::from_settings(settings)?,
            Collaborators::from_settings(&settings.collaborators),
            Arc::new(JsonFileStore::new(settings.layout())),
        ))
    }

    pub fn store(&self) -> &Arc<dyn AssetStore> {
        &self.store
    }

    async fn checkpoint(&self, asset: &VideoAsset) -> Result<()> {
        self.store.put(&asset.id, asset).await
    }

    async fn advance(&self, asset: &mut VideoAsset, next: AssetStatus) -> Result<()> {
        asset.advance(next)?;
        self.checkpoint(asset).await?;
        info!(asset_id = %asset.id, status = %next, "checkpoint");
        Ok(())
    }

    /// Mark the asset failed, persist that, and wrap the cause.
    async fn fail(&self, asset: &mut VideoAsset, cause: TubeforgeError) -> TubeforgeError {
        error!(asset_id = %asset.id, status = %asset.status, error = %cause, "asset failed");
        asset.fail(cause.to_string());
        if let Err(e) = self.checkpoint(asset).await {
            error!(asset_id = %asset.id, error = %e, "failed to record failure");
        }
        TubeforgeError::AssetFailed {
            id: asset.id.to_string(),
            source: Box::new(cause),
        }
    }

    /// Produce a script, a voice-over and any configured collaborator
    /// artifacts for one topic.
    pub async fn run_pipeline(&self, topic: &str, audience: &str, tone: &str) -> Result<VideoAsset> {
        let mut asset = VideoAsset::new(topic, audience, tone);
        info!(asset_id = %asset.id, topic, audience, tone, "starting pipeline");
        self.checkpoint(&asset).await?;

        let script = match self.script.generate(&asset.id, topic, audience, tone).await {
            Ok(script) => script,
            Err(e) => return Err(self.fail(&mut asset, e).await),
        };
        asset.script = Some(script);
        self.advance(&mut asset, AssetStatus::ScriptReady).await?;

        let text = asset.script_text().unwrap_or_default().to_string();
        let narration = match self.voice.synthesize(&asset.id, &text).await {
            Ok(narration) => narration,
            Err(e) => return Err(self.fail(&mut asset, e).await),
        };
        asset.audio_file = Some(narration.path);
        asset.voice_provider = Some(narration.provider);
        asset.voice_failures = narration.recovered_failures;
        self.advance(&mut asset, AssetStatus::VoiceReady).await?;

        if let Err(e) = self.run_collaborators(&mut asset).await {
            return Err(self.fail(&mut asset, e).await);
        }
        self.advance(&mut asset, AssetStatus::CollaboratorReady).await?;

        Ok(asset)
    }

    async fn run_collaborators(&self, asset: &mut VideoAsset) -> Result<()> {
        match &self.collaborators.video {
            Some(renderer) => {
                let path = renderer
                    .render_video(&job_for(asset))
                    .await
                    .map_err(|e| collaborator_failure("video", e))?;
                asset.video_file = Some(path);
            }
            None => info!(asset_id = %asset.id, "no video renderer configured, skipping"),
        }

        match &self.collaborators.thumbnail {
            Some(renderer) => {
                let path = renderer
                    .render_thumbnail(&job_for(asset))
                    .await
                    .map_err(|e| collaborator_failure("thumbnail", e))?;
                asset.thumbnail_file = Some(path);
            }
            None => info!(asset_id = %asset.id, "no thumbnail renderer configured, skipping"),
        }

        match &self.collaborators.metadata {
            Some(writer) => {
                let metadata = writer
                    .write_metadata(&job_for(asset))
                    .await
                    .map_err(|e| collaborator_failure("metadata", e))?;
                asset.metadata = Some(metadata);
            }
            None => info!(asset_id = %asset.id, "no metadata writer configured, skipping"),
        }

        Ok(())
    }

    /// Schedule a finished asset, and upload it when an uploader is configured.
    pub async fn publish(&self, asset: &mut VideoAsset, scheduled_at: DateTime<Utc>) -> Result<()> {
        asset.scheduled_at = Some(scheduled_at);
        self.advance(asset, AssetStatus::Scheduled).await?;

        let Some(uploader) = &self.collaborators.uploader else {
            return Ok(());
        };

        let receipt = match uploader.upload(&job_for(asset)).await {
            Ok(receipt) => receipt,
            Err(e) => {
                let cause = collaborator_failure("upload", e);
                return Err(self.fail(asset, cause).await);
            }
        };
        info!(asset_id = %asset.id, url = %receipt.url, "uploaded");
        asset.upload = Some(receipt);
        self.advance(asset, AssetStatus::Uploaded).await
    }
}
