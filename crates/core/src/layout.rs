use std::path::PathBuf;

use crate::types::AssetId;

pub fn get_root_output_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("tubeforge")
}

/// Fixed on-disk layout of every artifact keyed by asset id.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("scripts")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join("metadata")
    }

    /// Get the path for a written-once script file
    pub fn script_path(&self, id: &AssetId) -> PathBuf {
        self.scripts_dir().join(format!("{}_script.txt", id))
    }

    /// Voice-over path without extension; the codec actually produced picks it
    pub fn audio_base(&self, id: &AssetId) -> PathBuf {
        self.audio_dir().join(format!("{}_voiceover", id))
    }

    /// Get the path for a persisted asset record
    pub fn record_path(&self, id: &AssetId) -> PathBuf {
        self.metadata_dir().join(format!("{}_data.json", id))
    }
}
