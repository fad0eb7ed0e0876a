//! Offline synthesis used when every remote speech service has failed.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;

use crate::{
    chain::{Provider, ProviderChain, ProviderFailure, TerminalFallback},
    config::{LocalTtsSettings, TranscodeSettings},
};

use super::{
    SpeechRequest,
    transcode::{FfmpegTranscoder, SilentPlaceholder, TranscodeJob, WavTranscoder},
};

/// A speech engine that renders text straight to a WAV file.
#[async_trait]
pub trait LocalEngine: Send + Sync {
    fn name(&self) -> &str;

    /// `scratch` is a private directory the engine may use for temporary files.
    async fn render(
        &self,
        text: &str,
        speed: f32,
        scratch: &Path,
        wav: &Path,
    ) -> Result<(), ProviderFailure>;
}

/// `espeak-ng`-compatible command line engine.
pub struct EspeakEngine {
    settings: LocalTtsSettings,
}

impl EspeakEngine {
    pub fn new(settings: LocalTtsSettings) -> Self {
        Self { settings }
    }

    pub fn words_per_minute(&self, speed: f32) -> u32 {
        ((self.settings.words_per_minute as f32 * speed).round() as u32).clamp(80, 450)
    }
}

#[async_trait]
impl LocalEngine for EspeakEngine {
    fn name(&self) -> &str {
        &self.settings.program
    }

    async fn render(
        &self,
        text: &str,
        speed: f32,
        scratch: &Path,
        wav: &Path,
    ) -> Result<(), ProviderFailure> {
        let text_file = scratch.join("script.txt");
        tokio::fs::write(&text_file, text).await?;

        let mut command = Command::new(&self.settings.program);
        command
            .args(["-v", self.settings.voice.as_str()])
            .args(["-s", self.words_per_minute(speed).to_string().as_str()])
            .arg("-f")
            .arg(&text_file)
            .arg("-w")
            .arg(wav)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let timeout = Duration::from_secs(self.settings.timeout_secs);
        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderFailure::Configuration(format!(
                    "{} not found",
                    self.settings.program
                )));
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(ProviderFailure::Transient(format!(
                    "{} timed out after {:?}",
                    self.settings.program, timeout
                )));
            }
        };

        if !output.status.success() {
            return Err(ProviderFailure::Transient(format!(
                "{} failed: {}",
                self.settings.program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let len = tokio::fs::metadata(wav).await.map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            return Err(ProviderFailure::Transient(format!(
                "{} produced no audio",
                self.settings.program
            )));
        }
        Ok(())
    }
}

/// Local engine, then transcode, then silence.
///
/// The engine's WAV lives in a temporary directory that is removed when
/// synthesis finishes, whichever way it ends.
pub struct LocalSynthesis {
    engine: Arc<dyn LocalEngine>,
    transcode: ProviderChain<TranscodeJob, PathBuf>,
    placeholder: SilentPlaceholder,
}

impl LocalSynthesis {
    pub fn new(engine: Arc<dyn LocalEngine>, transcode: ProviderChain<TranscodeJob, PathBuf>) -> Self {
        Self {
            engine,
            transcode,
            placeholder: SilentPlaceholder,
        }
    }

    pub fn from_settings(local: &LocalTtsSettings, transcode: &TranscodeSettings) -> Self {
        Self::new(
            Arc::new(EspeakEngine::new(local.clone())),
            transcode_chain(transcode),
        )
    }
}

/// ffmpeg, then the in-process WAV normalizer, then silence.
pub fn transcode_chain(settings: &TranscodeSettings) -> ProviderChain<TranscodeJob, PathBuf> {
    let transcoders: Vec<Arc<dyn Provider<TranscodeJob, PathBuf>>> = vec![
        Arc::new(FfmpegTranscoder::new(settings.clone())),
        Arc::new(WavTranscoder::new(settings.sample_rate, settings.channels)),
    ];
    ProviderChain::new(
        "transcode",
        transcoders,
        Arc::new(SilentPlaceholder),
        Duration::from_secs(settings.timeout_secs),
    )
}

#[async_trait]
impl TerminalFallback<SpeechRequest, PathBuf> for LocalSynthesis {
    fn name(&self) -> &str {
        "local"
    }

    async fn produce(&self, request: &SpeechRequest) -> PathBuf {
        let scratch = match tempfile::Builder::new().prefix("tubeforge-tts").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "cannot create scratch directory for local synthesis");
                return self
                    .placeholder
                    .write(&request.output_base, request.word_count)
                    .await;
            }
        };

        let wav = scratch.path().join("speech.wav");
        if let Err(e) = self
            .engine
            .render(&request.text, request.speed, scratch.path(), &wav)
            .await
        {
            warn!(engine = self.engine.name(), error = %e, "local synthesis failed");
            return self
                .placeholder
                .write(&request.output_base, request.word_count)
                .await;
        }

        let job = TranscodeJob {
            input: wav,
            output_base: request.output_base.clone(),
            word_count: request.word_count,
        };
        self.transcode.run(&job).await.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    #[async_trait]
    impl LocalEngine for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn render(&self, _: &str, _: f32, _: &Path, _: &Path) -> Result<(), ProviderFailure> {
            Err(ProviderFailure::Transient("no voices installed".into()))
        }
    }

    /// Writes one second of a 22.05 kHz mono tone.
    struct Tone;

    #[async_trait]
    impl LocalEngine for Tone {
        fn name(&self) -> &str {
            "tone"
        }

        async fn render(&self, _: &str, _: f32, _: &Path, wav: &Path) -> Result<(), ProviderFailure> {
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: 22_050,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let mut writer = hound::WavWriter::create(wav, spec).unwrap();
            for i in 0..22_050 {
                writer.write_sample(((i % 50) * 100) as i16).unwrap();
            }
            writer.finalize().unwrap();
            Ok(())
        }
    }

    fn no_ffmpeg() -> TranscodeSettings {
        TranscodeSettings {
            program: "tubeforge-no-such-ffmpeg".into(),
            ..TranscodeSettings::default()
        }
    }

    fn request(dir: &Path) -> SpeechRequest {
        SpeechRequest {
            text: "one two three four five".into(),
            speed: 1.0,
            output_base: dir.join("voice"),
            word_count: 5,
        }
    }

    #[test]
    fn speed_scales_words_per_minute() {
        let engine = EspeakEngine::new(LocalTtsSettings::default());
        assert_eq!(engine.words_per_minute(1.0), 175);
        assert_eq!(engine.words_per_minute(2.0), 350);
        assert_eq!(engine.words_per_minute(0.1), 80);
    }

    #[tokio::test]
    async fn engine_failure_goes_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalSynthesis::new(Arc::new(Broken), transcode_chain(&no_ffmpeg()));

        let path = local.produce(&request(dir.path())).await;

        assert_eq!(path, dir.path().join("voice.wav"));
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.duration(), 16_000 * 2);
    }

    #[tokio::test]
    async fn without_ffmpeg_engine_output_is_normalized_in_process() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalSynthesis::new(Arc::new(Tone), transcode_chain(&no_ffmpeg()));

        let path = local.produce(&request(dir.path())).await;

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 44_100);
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration(), 44_100);
    }

    #[tokio::test]
    async fn missing_engine_binary_is_configuration_failure() {
        let dir = tempfile::tempdir().unwrap();
        let engine = EspeakEngine::new(LocalTtsSettings {
            program: "tubeforge-no-such-espeak".into(),
            ..LocalTtsSettings::default()
        });

        let err = engine
            .render("hi", 1.0, dir.path(), &dir.path().join("out.wav"))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
