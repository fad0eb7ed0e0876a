//! Conversion of the local engine's WAV into the distribution format.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{error, info};

use crate::{
    chain::{Provider, ProviderFailure, TerminalFallback},
    config::TranscodeSettings,
    script::structure::reading_seconds,
};

use super::{commit_staged, stage_beside, with_extension};

pub const PLACEHOLDER_SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub input: PathBuf,
    /// Final path without extension; each transcoder adds its own.
    pub output_base: PathBuf,
    /// Sizes the silent placeholder.
    pub word_count: usize,
}

fn hound_failure(e: hound::Error) -> ProviderFailure {
    ProviderFailure::Transient(format!("WAV error: {e}"))
}

fn join_failure(e: tokio::task::JoinError) -> ProviderFailure {
    ProviderFailure::Transient(format!("Transcode task failed: {e}"))
}

async fn ensure_non_empty(path: &Path) -> Result<(), ProviderFailure> {
    let len = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
    if len == 0 {
        return Err(ProviderFailure::Transient(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(())
}

/// External ffmpeg-compatible transcoder.
pub struct FfmpegTranscoder {
    settings: TranscodeSettings,
}

impl FfmpegTranscoder {
    pub fn new(settings: TranscodeSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Provider<TranscodeJob, PathBuf> for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn attempt(&self, job: &TranscodeJob) -> Result<PathBuf, ProviderFailure> {
        let output = with_extension(&job.output_base, &self.settings.extension);
        let staged = stage_beside(&output)?;

        let result = Command::new(&self.settings.program)
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(&job.input)
            .args(["-acodec", self.settings.codec.as_str()])
            .args(["-b:a", self.settings.bitrate.as_str()])
            .args(["-ar", self.settings.sample_rate.to_string().as_str()])
            .args(["-ac", self.settings.channels.to_string().as_str()])
            .arg(&*staged)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let result = match result {
            Ok(result) => result,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderFailure::Configuration(format!(
                    "{} not found",
                    self.settings.program
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if !result.status.success() {
            return Err(ProviderFailure::Transient(format!(
                "ffmpeg failed: {}",
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        ensure_non_empty(&staged).await?;
        commit_staged(staged, &output)
    }
}

/// In-process fallback: rewrites the WAV at the target rate and channel
/// count as 16-bit PCM.
pub struct WavTranscoder {
    sample_rate: u32,
    channels: u16,
}

impl WavTranscoder {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
        }
    }
}

#[async_trait]
impl Provider<TranscodeJob, PathBuf> for WavTranscoder {
    fn name(&self) -> &str {
        "wav"
    }

    async fn attempt(&self, job: &TranscodeJob) -> Result<PathBuf, ProviderFailure> {
        let input = job.input.clone();
        let output = with_extension(&job.output_base, "wav");
        let (sample_rate, channels) = (self.sample_rate, self.channels);

        // The blocking task owns the staged file, so it is cleaned up even
        // when this attempt is abandoned before the task finishes.
        let staged = stage_beside(&output)?;
        let staged = tokio::task::spawn_blocking(move || {
            normalize_wav(&input, &staged, sample_rate, channels).map(|()| staged)
        })
        .await
        .map_err(join_failure)??;

        ensure_non_empty(&staged).await?;
        commit_staged(staged, &output)
    }
}

fn read_wav_samples(path: &Path) -> Result<(Vec<f32>, u32, usize), ProviderFailure> {
    let mut reader = hound::WavReader::open(path).map_err(hound_failure)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(hound_failure)?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(hound_failure)?,
    };

    Ok((samples, spec.sample_rate, spec.channels.max(1) as usize))
}

fn remix(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to {
        return samples.to_vec();
    }
    samples
        .chunks(from)
        .flat_map(|frame| {
            let mono = frame.iter().sum::<f32>() / frame.len() as f32;
            std::iter::repeat_n(mono, to)
        })
        .collect()
}

/// Linear interpolation between neighbouring frames.
fn resample(samples: &[f32], channels: usize, from: u32, to: u32) -> Vec<f32> {
    if from == to || samples.is_empty() {
        return samples.to_vec();
    }
    let frames = samples.len() / channels;
    if frames == 0 {
        return Vec::new();
    }
    let out_frames = ((frames as u64 * to as u64).div_ceil(from as u64)) as usize;
    let step = from as f64 / to as f64;

    let mut out = Vec::with_capacity(out_frames * channels);
    for j in 0..out_frames {
        let pos = j as f64 * step;
        let i = (pos.floor() as usize).min(frames - 1);
        let next = (i + 1).min(frames - 1);
        let frac = (pos - i as f64).clamp(0.0, 1.0) as f32;
        for c in 0..channels {
            let a = samples[i * channels + c];
            let b = samples[next * channels + c];
            out.push(a + (b - a) * frac);
        }
    }
    out
}

fn normalize_wav(
    input: &Path,
    output: &Path,
    sample_rate: u32,
    channels: u16,
) -> Result<(), ProviderFailure> {
    let (samples, source_rate, source_channels) = read_wav_samples(input)?;
    if samples.is_empty() {
        return Err(ProviderFailure::Transient("input WAV has no samples".into()));
    }

    let target_channels = channels as usize;
    let samples = remix(&samples, source_channels, target_channels);
    let samples = resample(&samples, target_channels, source_rate, sample_rate);

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output, spec).map_err(hound_failure)?;
    for sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value).map_err(hound_failure)?;
    }
    writer.finalize().map_err(hound_failure)?;
    Ok(())
}

/// Whole seconds of silence standing in for `word_count` words of speech.
pub fn placeholder_seconds(word_count: usize) -> u32 {
    (reading_seconds(word_count).round() as u32).max(1)
}

pub fn write_silence(path: &Path, seconds: u32) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: PLACEHOLDER_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for _ in 0..(PLACEHOLDER_SAMPLE_RATE as u64 * seconds as u64) {
        writer.write_sample(0i16)?;
    }
    writer.finalize()
}

/// Last step of every voice path: silence of the narration's estimated length.
pub struct SilentPlaceholder;

impl SilentPlaceholder {
    /// Returns the intended path even when the write fails; the voice stage
    /// checks the file before accepting it.
    pub async fn write(&self, output_base: &Path, word_count: usize) -> PathBuf {
        let path = with_extension(output_base, "wav");
        let seconds = placeholder_seconds(word_count);

        let target = path.clone();
        let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let staged = stage_beside(&target)?;
            write_silence(&staged, seconds).map_err(std::io::Error::other)?;
            staged.persist(&target).map_err(|e| e.error)
        })
        .await;

        match result {
            Ok(Ok(())) => info!(path = %path.display(), seconds, "wrote silent placeholder"),
            Ok(Err(e)) => error!(path = %path.display(), error = %e, "failed to write placeholder"),
            Err(e) => error!(error = %e, "placeholder task failed"),
        }
        path
    }
}

#[async_trait]
impl TerminalFallback<TranscodeJob, PathBuf> for SilentPlaceholder {
    fn name(&self) -> &str {
        "silent-placeholder"
    }

    async fn produce(&self, job: &TranscodeJob) -> PathBuf {
        self.write(&job.output_base, job.word_count).await
    }
}
