//! Voice stage: turn script text into a narration audio file.

pub mod local;
pub mod speech;
pub mod transcode;

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tempfile::{NamedTempFile, TempPath};
use tracing::{info, warn};

use crate::{
    chain::{Provider, ProviderChain, ProviderFailure, TerminalFallback},
    config::Settings,
    error::{Result, TubeforgeError},
    layout::OutputLayout,
    sanitize::Sanitizer,
    script::structure::word_count,
    types::AssetId,
};

pub use local::{EspeakEngine, LocalEngine, LocalSynthesis, transcode_chain};
pub use speech::{ElevenLabsProvider, OpenAiSpeechProvider, TtsMakerProvider, build_speech_providers};
pub use transcode::{FfmpegTranscoder, SilentPlaceholder, TranscodeJob, WavTranscoder};

/// Input handed to every speech provider.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    /// Sanitized narration
    pub text: String,
    pub speed: f32,
    /// Final audio path without extension
    pub output_base: PathBuf,
    pub word_count: usize,
}

/// Audio produced by the voice stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Narration {
    pub path: PathBuf,
    /// Provider or fallback that produced the file
    pub provider: String,
    pub recovered_failures: Vec<String>,
}

/// `base` plus `.ext`, keeping any dots already in the file name.
pub fn with_extension(base: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Empty scratch file in `target`'s directory with the same extension.
///
/// The file is deleted when the returned path is dropped, so an attempt that
/// fails or is cancelled mid-write leaves nothing next to the final artifact.
pub(crate) fn stage_beside(target: &Path) -> std::io::Result<TempPath> {
    let dir = target
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let suffix = target
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(".tubeforge-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .map(NamedTempFile::into_temp_path)
}

/// Move a finished staged file to `target`.
pub(crate) fn commit_staged(
    staged: TempPath,
    target: &Path,
) -> std::result::Result<PathBuf, ProviderFailure> {
    staged.persist(target).map_err(|e| {
        ProviderFailure::Transient(format!("cannot move audio to {}: {}", target.display(), e.error))
    })?;
    Ok(target.to_path_buf())
}

pub struct VoiceStage {
    sanitizer: Sanitizer,
    chain: ProviderChain<SpeechRequest, PathBuf>,
    layout: OutputLayout,
    speed: f32,
}

impl VoiceStage {
    pub fn new(
        sanitizer: Sanitizer,
        providers: Vec<Arc<dyn Provider<SpeechRequest, PathBuf>>>,
        fallback: Arc<dyn TerminalFallback<SpeechRequest, PathBuf>>,
        layout: OutputLayout,
        speed: f32,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            sanitizer,
            chain: ProviderChain::new("voice", providers, fallback, attempt_timeout),
            layout,
            speed,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let voice = &settings.voice;
        let client = reqwest::Client::new();
        Ok(Self::new(
            Sanitizer::new(&voice.abbreviations)?,
            build_speech_providers(voice, &client),
            Arc::new(LocalSynthesis::from_settings(&voice.local, &voice.transcode)),
            settings.layout(),
            voice.speed,
            Duration::from_secs(voice.timeout_secs),
        ))
    }

    /// Render narration for `script_text` and return the audio file.
    ///
    /// The only failure is every path, placeholder included, leaving no
    /// usable file behind.
    pub async fn synthesize(&self, id: &AssetId, script_text: &str) -> Result<Narration> {
        let text = self.sanitizer.sanitize(script_text);
        let output_base = self.layout.audio_base(id);

        if let Some(dir) = output_base.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let request = SpeechRequest {
            word_count: word_count(&text),
            text,
            speed: self.speed,
            output_base,
        };
        let served = self.chain.run(&request).await;

        let len = tokio::fs::metadata(&served.value)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if len == 0 {
            warn!(asset_id = %id, path = %served.value.display(), "no usable audio produced");
            return Err(TubeforgeError::ExhaustedFallback {
                reason: format!("{} is missing or empty", served.value.display()),
            });
        }

        info!(asset_id = %id, provider = %served.served_by, path = %served.value.display(), "voice-over ready");
        Ok(Narration {
            recovered_failures: served.failure_notes(),
            path: served.value,
            provider: served.served_by,
        })
    }
}
