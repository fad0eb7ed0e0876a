use std::{fmt, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TubeforgeError};

/// Opaque asset identifier. UUIDv7-backed, so lexical order follows creation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn generate() -> Self {
        Self(format!("video_{}", Uuid::now_v7().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Created,
    ScriptReady,
    VoiceReady,
    CollaboratorReady,
    Scheduled,
    Uploaded,
    Failed,
}

impl AssetStatus {
    /// The only status a healthy asset may advance to next.
    pub fn successor(self) -> Option<AssetStatus> {
        match self {
            AssetStatus::Created => Some(AssetStatus::ScriptReady),
            AssetStatus::ScriptReady => Some(AssetStatus::VoiceReady),
            AssetStatus::VoiceReady => Some(AssetStatus::CollaboratorReady),
            AssetStatus::CollaboratorReady => Some(AssetStatus::Scheduled),
            AssetStatus::Scheduled => Some(AssetStatus::Uploaded),
            AssetStatus::Uploaded | AssetStatus::Failed => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetStatus::Created => "created",
            AssetStatus::ScriptReady => "script_ready",
            AssetStatus::VoiceReady => "voice_ready",
            AssetStatus::CollaboratorReady => "collaborator_ready",
            AssetStatus::Scheduled => "scheduled",
            AssetStatus::Uploaded => "uploaded",
            AssetStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub content: String,
    pub start_seconds: f64,
    pub duration_seconds: f64,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptResult {
    pub text: String,
    pub sections: Vec<Section>,
    pub word_count: usize,
    pub estimated_minutes: f64,
    /// Name of the provider (or template fallback) that wrote the text
    pub provider: String,
    /// Providers tried before `provider`, with why each was passed over
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recovered_failures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAsset {
    pub id: AssetId,
    pub topic: String,
    pub audience: String,
    pub tone: String,
    pub script: Option<ScriptResult>,
    pub audio_file: Option<PathBuf>,
    /// Speech provider or fallback that produced `audio_file`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub voice_failures: Vec<String>,
    pub video_file: Option<PathBuf>,
    pub thumbnail_file: Option<PathBuf>,
    pub metadata: Option<serde_json::Value>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub upload: Option<UploadReceipt>,
    pub status: AssetStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoAsset {
    pub fn new(topic: &str, audience: &str, tone: &str) -> Self {
        let now = Utc::now();
        Self {
            id: AssetId::generate(),
            topic: topic.to_string(),
            audience: audience.to_string(),
            tone: tone.to_string(),
            script: None,
            audio_file: None,
            voice_provider: None,
            voice_failures: Vec::new(),
            video_file: None,
            thumbnail_file: None,
            metadata: None,
            scheduled_at: None,
            upload: None,
            status: AssetStatus::Created,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to the next status. Only the direct successor of the current
    /// status is accepted; `failed` is reached through [`VideoAsset::fail`].
    pub fn advance(&mut self, next: AssetStatus) -> Result<()> {
        if self.status.successor() != Some(next) {
            return Err(TubeforgeError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = AssetStatus::Failed;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
    }

    pub fn script_text(&self) -> Option<&str> {
        self.script.as_ref().map(|s| s.text.as_str())
    }
}
