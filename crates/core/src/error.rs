use std::path::PathBuf;
use thiserror::Error;

use crate::types::AssetStatus;

#[derive(Error, Debug)]
pub enum TubeforgeError {
    #[error("Voice synthesis exhausted every fallback: {reason}")]
    ExhaustedFallback { reason: String },

    #[error("{stage} failed: {reason}")]
    Collaborator { stage: &'static str, reason: String },

    #[error("Illegal status transition from {from} to {to}")]
    IllegalTransition { from: AssetStatus, to: AssetStatus },

    #[error("Asset {id} failed: {source}")]
    AssetFailed {
        id: String,
        #[source]
        source: Box<TubeforgeError>,
    },

    #[error("Asset record not found: {id}")]
    AssetNotFound { id: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Failed to write {}: {reason}", path.display())]
    WriteFailed { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Config encode error: {0}")]
    TomlEncodeError(#[from] toml::ser::Error),

    #[error("Invalid pattern: {0}")]
    RegexError(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, TubeforgeError>;
