pub mod batch;
pub mod chain;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod format;
pub mod layout;
pub mod orchestrator;
pub mod provider;
pub mod sanitize;
pub mod script;
pub mod store;
pub mod types;
pub mod voice;

pub use batch::{BatchItem, BatchOutcome, BatchScheduler};
pub use chain::{Provider, ProviderChain, ProviderFailure, Served, TerminalFallback};
pub use collaborators::{
    CollaboratorJob, Collaborators, ExternalCommand, MetadataWriter, ThumbnailRenderer, Uploader,
    VideoRenderer,
};
pub use config::Settings;
pub use error::{Result, TubeforgeError};
pub use format::{format_asset_line, format_asset_readable, format_batch_outcome, format_timestamp};
pub use layout::{OutputLayout, get_root_output_dir};
pub use orchestrator::Orchestrator;
pub use provider::{BackendConfig, SpeechBackend, TextBackend};
pub use sanitize::{Sanitizer, default_abbreviations};
pub use script::ScriptStage;
pub use store::{AssetStore, JsonFileStore};
pub use types::{AssetId, AssetStatus, ScriptResult, Section, UploadReceipt, VideoAsset};
pub use voice::{Narration, VoiceStage};
