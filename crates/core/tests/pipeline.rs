use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tubeforge_core::{
    AssetId, AssetStatus, AssetStore, BatchItem, BatchOutcome, BatchScheduler, CollaboratorJob,
    Collaborators, JsonFileStore, Orchestrator, OutputLayout, ProviderFailure, ScriptStage,
    Sanitizer, TerminalFallback, TubeforgeError, UploadReceipt, Uploader, VideoAsset,
    VideoRenderer, VoiceStage,
    config::TranscodeSettings,
    default_abbreviations,
    voice::{
        LocalEngine, LocalSynthesis, SpeechRequest, transcode::placeholder_seconds,
        transcode_chain, with_extension,
    },
};

/// Local engine with no voices installed.
struct Mute;

#[async_trait]
impl LocalEngine for Mute {
    fn name(&self) -> &str {
        "mute"
    }

    async fn render(&self, _: &str, _: f32, _: &Path, _: &Path) -> Result<(), ProviderFailure> {
        Err(ProviderFailure::Transient("no voices installed".into()))
    }
}

/// Fallback that names a file but never writes it.
struct Vanishing;

#[async_trait]
impl TerminalFallback<SpeechRequest, PathBuf> for Vanishing {
    fn name(&self) -> &str {
        "vanishing"
    }

    async fn produce(&self, request: &SpeechRequest) -> PathBuf {
        with_extension(&request.output_base, "wav")
    }
}

/// Renders an empty video file, except for the topic "Broken".
struct PickyRenderer {
    dir: PathBuf,
}

#[async_trait]
impl VideoRenderer for PickyRenderer {
    async fn render_video(&self, job: &CollaboratorJob) -> anyhow::Result<PathBuf> {
        if job.topic == "Broken" {
            anyhow::bail!("renderer crashed");
        }
        let path = self.dir.join(format!("{}.mp4", job.asset_id));
        tokio::fs::write(&path, b"video").await?;
        Ok(path)
    }
}

struct FakeUploader {
    fail: bool,
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn upload(&self, job: &CollaboratorJob) -> anyhow::Result<UploadReceipt> {
        if self.fail {
            anyhow::bail!("quota exceeded");
        }
        Ok(UploadReceipt {
            url: format!("https://videos.example/{}", job.asset_id),
            uploaded_at: Utc::now(),
        })
    }
}

/// Records the status of every checkpoint before storing it.
struct RecordingStore {
    inner: JsonFileStore,
    statuses: Mutex<Vec<AssetStatus>>,
}

#[async_trait]
impl AssetStore for RecordingStore {
    async fn get(&self, id: &AssetId) -> tubeforge_core::Result<Option<VideoAsset>> {
        self.inner.get(id).await
    }

    async fn put(&self, id: &AssetId, asset: &VideoAsset) -> tubeforge_core::Result<()> {
        self.statuses.lock().unwrap().push(asset.status);
        self.inner.put(id, asset).await
    }
}

fn offline_orchestrator(
    root: &Path,
    collaborators: Collaborators,
    store: Arc<dyn AssetStore>,
) -> Orchestrator {
    let layout = OutputLayout::new(root);
    let transcode = transcode_chain(&TranscodeSettings {
        program: "tubeforge-no-such-ffmpeg".into(),
        ..TranscodeSettings::default()
    });

    let script = ScriptStage::new(Vec::new(), layout.clone(), Duration::from_secs(5));
    let voice = VoiceStage::new(
        Sanitizer::new(&default_abbreviations()).unwrap(),
        Vec::new(),
        Arc::new(LocalSynthesis::new(Arc::new(Mute), transcode)),
        layout,
        1.0,
        Duration::from_secs(5),
    );
    Orchestrator::new(script, voice, collaborators, store)
}

fn json_store(root: &Path) -> Arc<JsonFileStore> {
    Arc::new(JsonFileStore::new(OutputLayout::new(root)))
}

#[tokio::test]
async fn offline_pipeline_falls_back_to_template_and_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let store = json_store(dir.path());
    let orchestrator = offline_orchestrator(dir.path(), Collaborators::default(), store.clone());

    let asset = orchestrator
        .run_pipeline("Cats", "pet owners", "funny")
        .await
        .unwrap();

    assert_eq!(asset.status, AssetStatus::CollaboratorReady);
    let script = asset.script.as_ref().unwrap();
    assert_eq!(script.provider, "template");
    assert!(script.text.contains("Cats"));
    assert!(script.text.contains("pet owners"));
    let summed: usize = script.sections.iter().map(|s| s.word_count).sum();
    assert_eq!(summed, script.word_count);
    assert_eq!(script.estimated_minutes, script.word_count as f64 / 150.0);

    let script_file = dir
        .path()
        .join("scripts")
        .join(format!("{}_script.txt", asset.id));
    assert_eq!(tokio::fs::read_to_string(&script_file).await.unwrap(), script.text);

    let audio = asset.audio_file.clone().unwrap();
    assert_eq!(
        audio,
        dir.path()
            .join("audio")
            .join(format!("{}_voiceover.wav", asset.id))
    );
    let spoken = Sanitizer::new(&default_abbreviations())
        .unwrap()
        .sanitize(&script.text);
    let expected_seconds = placeholder_seconds(spoken.split_whitespace().count());
    let reader = hound::WavReader::open(&audio).unwrap();
    assert_eq!(reader.duration(), reader.spec().sample_rate * expected_seconds);

    assert_eq!(asset.voice_provider.as_deref(), Some("local"));
    assert!(asset.voice_failures.is_empty());

    let stored = store.load(&asset.id).await.unwrap();
    assert_eq!(stored.status, AssetStatus::CollaboratorReady);
    assert_eq!(stored.audio_file, asset.audio_file);
    assert_eq!(stored.voice_provider, asset.voice_provider);
}

#[tokio::test]
async fn exhausted_voice_fallback_fails_asset_after_script_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RecordingStore {
        inner: JsonFileStore::new(OutputLayout::new(dir.path())),
        statuses: Mutex::new(Vec::new()),
    });
    let layout = OutputLayout::new(dir.path());
    let orchestrator = Orchestrator::new(
        ScriptStage::new(Vec::new(), layout.clone(), Duration::from_secs(5)),
        VoiceStage::new(
            Sanitizer::new(&default_abbreviations()).unwrap(),
            Vec::new(),
            Arc::new(Vanishing),
            layout,
            1.0,
            Duration::from_secs(5),
        ),
        Collaborators::default(),
        store.clone(),
    );

    let err = orchestrator
        .run_pipeline("Cats", "pet owners", "funny")
        .await
        .unwrap_err();

    let (id, source) = match err {
        TubeforgeError::AssetFailed { id, source } => (id, source),
        other => panic!("expected AssetFailed, got {other:?}"),
    };
    assert!(matches!(*source, TubeforgeError::ExhaustedFallback { .. }));
    assert_eq!(
        *store.statuses.lock().unwrap(),
        vec![
            AssetStatus::Created,
            AssetStatus::ScriptReady,
            AssetStatus::Failed,
        ]
    );

    let record = store.inner.load(&AssetId::from(id.as_str())).await.unwrap();
    assert_eq!(record.status, AssetStatus::Failed);
    assert!(record.error.unwrap().contains("missing or empty"));
    assert!(record.script.is_some());
    assert!(record.audio_file.is_none());
}

#[tokio::test]
async fn voice_checkpoint_survives_collaborator_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RecordingStore {
        inner: JsonFileStore::new(OutputLayout::new(dir.path())),
        statuses: Mutex::new(Vec::new()),
    });
    let collaborators = Collaborators {
        video: Some(Arc::new(PickyRenderer {
            dir: dir.path().to_path_buf(),
        })),
        ..Collaborators::default()
    };
    let orchestrator = offline_orchestrator(dir.path(), collaborators, store.clone());

    let err = orchestrator
        .run_pipeline("Broken", "general", "engaging")
        .await
        .unwrap_err();

    let (id, source) = match err {
        TubeforgeError::AssetFailed { id, source } => (id, source),
        other => panic!("expected AssetFailed, got {other:?}"),
    };
    assert!(matches!(
        *source,
        TubeforgeError::Collaborator { stage: "video", .. }
    ));

    assert_eq!(
        *store.statuses.lock().unwrap(),
        vec![
            AssetStatus::Created,
            AssetStatus::ScriptReady,
            AssetStatus::VoiceReady,
            AssetStatus::Failed,
        ]
    );

    let record = store.inner.load(&AssetId::from(id.as_str())).await.unwrap();
    assert_eq!(record.status, AssetStatus::Failed);
    assert!(record.error.unwrap().contains("renderer crashed"));
    assert!(record.audio_file.is_some());
}

#[tokio::test]
async fn batch_keeps_order_and_slots_when_an_item_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = json_store(dir.path());
    let collaborators = Collaborators {
        video: Some(Arc::new(PickyRenderer {
            dir: dir.path().to_path_buf(),
        })),
        ..Collaborators::default()
    };
    let scheduler = BatchScheduler::new(
        offline_orchestrator(dir.path(), collaborators, store.clone()),
        Duration::ZERO,
    );

    let now: DateTime<Utc> = DateTime::parse_from_rfc3339("2026-03-01T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    let base = now + TimeDelta::hours(1);
    let items = vec![
        BatchItem::new("Cats"),
        BatchItem::new("Broken"),
        BatchItem::new("Dogs"),
    ];

    let outcomes = scheduler.run_batch_from(&items, 24, now).await;
    assert_eq!(outcomes.len(), 3);

    match &outcomes[0] {
        BatchOutcome::Scheduled {
            asset,
            scheduled_at,
        } => {
            assert_eq!(asset.topic, "Cats");
            assert_eq!(*scheduled_at, base);
            assert_eq!(asset.status, AssetStatus::Scheduled);
            assert!(asset.video_file.as_ref().unwrap().exists());
        }
        other => panic!("expected Cats to be scheduled, got {other:?}"),
    }

    match &outcomes[1] {
        BatchOutcome::Failed { error, item } => {
            assert_eq!(item, &items[1]);
            assert!(error.contains("renderer crashed"));
        }
        other => panic!("expected Broken to fail, got {other:?}"),
    }

    match &outcomes[2] {
        BatchOutcome::Scheduled {
            asset,
            scheduled_at,
        } => {
            assert_eq!(asset.topic, "Dogs");
            assert_eq!(*scheduled_at, base + TimeDelta::hours(48));
            let stored = store.load(&asset.id).await.unwrap();
            assert_eq!(stored.scheduled_at, Some(*scheduled_at));
        }
        other => panic!("expected Dogs to be scheduled, got {other:?}"),
    }
}

#[tokio::test]
async fn batch_with_unrepresentable_spacing_still_reports_every_item() {
    let dir = tempfile::tempdir().unwrap();
    let store = json_store(dir.path());
    let scheduler = BatchScheduler::new(
        offline_orchestrator(dir.path(), Collaborators::default(), store.clone()),
        Duration::ZERO,
    );
    let items = vec![BatchItem::new("Cats"), BatchItem::new("Dogs")];

    let outcomes = scheduler.run_batch(&items, u32::MAX).await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].is_scheduled());
    match &outcomes[1] {
        BatchOutcome::Failed { error, item } => {
            assert_eq!(item, &items[1]);
            assert!(error.contains("out of range"));
        }
        other => panic!("expected Dogs to fail, got {other:?}"),
    }
}

#[tokio::test]
async fn publish_uploads_when_uploader_is_configured() {
    let dir = tempfile::tempdir().unwrap();
    let store = json_store(dir.path());
    let collaborators = Collaborators {
        uploader: Some(Arc::new(FakeUploader { fail: false })),
        ..Collaborators::default()
    };
    let orchestrator = offline_orchestrator(dir.path(), collaborators, store.clone());

    let mut asset = orchestrator
        .run_pipeline("Cats", "pet owners", "funny")
        .await
        .unwrap();
    let slot = Utc::now() + TimeDelta::hours(1);
    orchestrator.publish(&mut asset, slot).await.unwrap();

    assert_eq!(asset.status, AssetStatus::Uploaded);
    assert_eq!(asset.scheduled_at, Some(slot));
    let stored = store.load(&asset.id).await.unwrap();
    assert_eq!(stored.status, AssetStatus::Uploaded);
    assert!(stored.upload.unwrap().url.ends_with(asset.id.as_str()));
}

#[tokio::test]
async fn failed_upload_marks_asset_failed() {
    let dir = tempfile::tempdir().unwrap();
    let store = json_store(dir.path());
    let collaborators = Collaborators {
        uploader: Some(Arc::new(FakeUploader { fail: true })),
        ..Collaborators::default()
    };
    let orchestrator = offline_orchestrator(dir.path(), collaborators, store.clone());

    let mut asset = orchestrator
        .run_pipeline("Cats", "pet owners", "funny")
        .await
        .unwrap();
    let err = orchestrator
        .publish(&mut asset, Utc::now())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("quota exceeded"));
    assert_eq!(asset.status, AssetStatus::Failed);
    let stored = store.load(&asset.id).await.unwrap();
    assert_eq!(stored.status, AssetStatus::Failed);
    assert!(stored.scheduled_at.is_some());
}
