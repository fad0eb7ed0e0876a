//! Stages owned by other tools: video rendering, thumbnails, metadata and upload.
//!
//! Each is an opaque, possibly failing async call. The shipped
//! implementation runs a configured command the same way for all four:
//! inputs go in as `TUBEFORGE_*` environment variables with the script text
//! on stdin, and the result is read from stdout.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::debug;

use crate::{
    config::{CollaboratorSettings, CommandSpec},
    types::{AssetId, UploadReceipt},
};

/// What every collaborator is given about the asset.
#[derive(Debug, Clone)]
pub struct CollaboratorJob {
    pub asset_id: AssetId,
    pub topic: String,
    pub script_text: String,
    pub audio_file: PathBuf,
    pub video_file: Option<PathBuf>,
    pub thumbnail_file: Option<PathBuf>,
}

#[async_trait]
pub trait VideoRenderer: Send + Sync {
    async fn render_video(&self, job: &CollaboratorJob) -> anyhow::Result<PathBuf>;
}

#[async_trait]
pub trait ThumbnailRenderer: Send + Sync {
    async fn render_thumbnail(&self, job: &CollaboratorJob) -> anyhow::Result<PathBuf>;
}

#[async_trait]
pub trait MetadataWriter: Send + Sync {
    async fn write_metadata(&self, job: &CollaboratorJob) -> anyhow::Result<Value>;
}

#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, job: &CollaboratorJob) -> anyhow::Result<UploadReceipt>;
}

/// Configured collaborators. Any of them may be absent.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub video: Option<Arc<dyn VideoRenderer>>,
    pub thumbnail: Option<Arc<dyn ThumbnailRenderer>>,
    pub metadata: Option<Arc<dyn MetadataWriter>>,
    pub uploader: Option<Arc<dyn Uploader>>,
}

impl Collaborators {
    pub fn from_settings(settings: &CollaboratorSettings) -> Self {
        Self {
            video: settings
                .video
                .clone()
                .map(|spec| Arc::new(ExternalCommand::new("video", spec)) as Arc<dyn VideoRenderer>),
            thumbnail: settings.thumbnail.clone().map(|spec| {
                Arc::new(ExternalCommand::new("thumbnail", spec)) as Arc<dyn ThumbnailRenderer>
            }),
            metadata: settings.metadata.clone().map(|spec| {
                Arc::new(ExternalCommand::new("metadata", spec)) as Arc<dyn MetadataWriter>
            }),
            uploader: settings
                .upload
                .clone()
                .map(|spec| Arc::new(ExternalCommand::new("upload", spec)) as Arc<dyn Uploader>),
        }
    }
}

/// A collaborator backed by an external program.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    stage: &'static str,
    spec: CommandSpec,
}

impl ExternalCommand {
    pub fn new(stage: &'static str, spec: CommandSpec) -> Self {
        Self { stage, spec }
    }

    /// Run the program for `job` and return its trimmed stdout.
    pub async fn run(&self, job: &CollaboratorJob) -> anyhow::Result<String> {
        let mut command = Command::new(&self.spec.program);
        command
            .args(&self.spec.args)
            .env("TUBEFORGE_STAGE", self.stage)
            .env("TUBEFORGE_ASSET_ID", job.asset_id.as_str())
            .env("TUBEFORGE_TOPIC", &job.topic)
            .env("TUBEFORGE_AUDIO_FILE", &job.audio_file)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(video) = &job.video_file {
            command.env("TUBEFORGE_VIDEO_FILE", video);
        }
        if let Some(thumbnail) = &job.thumbnail_file {
            command.env("TUBEFORGE_THUMBNAIL_FILE", thumbnail);
        }

        debug!(stage = self.stage, program = %self.spec.program, asset_id = %job.asset_id, "running collaborator");
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start {}", self.spec.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that ignores its input may exit before reading it.
            if let Err(e) = stdin.write_all(job.script_text.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e).context("failed to write script to stdin");
                }
            }
        }

        let timeout = Duration::from_secs(self.spec.timeout_secs);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .with_context(|| format!("{} timed out after {:?}", self.spec.program, timeout))??;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.spec.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run_for_file(&self, job: &CollaboratorJob) -> anyhow::Result<PathBuf> {
        let stdout = self.run(job).await?;
        let path = stdout
            .lines()
            .last()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .with_context(|| format!("{} printed no file path", self.spec.program))?;

        if !Path::new(&path).exists() {
            bail!("{} reported {} but it does not exist", self.spec.program, path.display());
        }
        Ok(path)
    }
}

#[async_trait]
impl VideoRenderer for ExternalCommand {
    async fn render_video(&self, job: &CollaboratorJob) -> anyhow::Result<PathBuf> {
        self.run_for_file(job).await
    }
}

#[async_trait]
impl ThumbnailRenderer for ExternalCommand {
    async fn render_thumbnail(&self, job: &CollaboratorJob) -> anyhow::Result<PathBuf> {
        self.run_for_file(job).await
    }
}

#[async_trait]
impl MetadataWriter for ExternalCommand {
    async fn write_metadata(&self, job: &CollaboratorJob) -> anyhow::Result<Value> {
        let stdout = self.run(job).await?;
        let metadata: Value = serde_json::from_str(&stdout)
            .with_context(|| format!("{} printed invalid JSON", self.spec.program))?;
        if !metadata.is_object() {
            bail!("{} must print a JSON object", self.spec.program);
        }
        Ok(metadata)
    }
}

/// Accepts `{"url": "..."}` or a bare URL.
pub fn parse_upload_receipt(stdout: &str) -> anyhow::Result<UploadReceipt> {
    let url = match serde_json::from_str::<Value>(stdout) {
        Ok(value) => value["url"]
            .as_str()
            .map(str::to_string)
            .context("upload output has no \"url\" field")?,
        Err(_) => stdout.trim().to_string(),
    };
    if url.is_empty() {
        bail!("uploader printed no URL");
    }
    Ok(UploadReceipt {
        url,
        uploaded_at: Utc::now(),
    })
}

#[async_trait]
impl Uploader for ExternalCommand {
    async fn upload(&self, job: &CollaboratorJob) -> anyhow::Result<UploadReceipt> {
        let stdout = self.run(job).await?;
        parse_upload_receipt(&stdout)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ExternalCommand {
        ExternalCommand::new(
            "test",
            CommandSpec {
                program: "sh".into(),
                args: vec!["-c".into(), script.into()],
                timeout_secs: 10,
            },
        )
    }

    fn job(dir: &Path) -> CollaboratorJob {
        CollaboratorJob {
            asset_id: AssetId::from("video_abc"),
            topic: "Cats".into(),
            script_text: "Hello cats".into(),
            audio_file: dir.join("voice.mp3"),
            video_file: None,
            thumbnail_file: None,
        }
    }

    #[tokio::test]
    async fn passes_inputs_through_env_and_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let out = sh(r#"printf '%s|%s|' "$TUBEFORGE_ASSET_ID" "$TUBEFORGE_TOPIC"; cat"#)
            .run(&job(dir.path()))
            .await
            .unwrap();
        assert_eq!(out, "video_abc|Cats|Hello cats");
    }

    #[tokio::test]
    async fn video_renderer_returns_printed_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("video.mp4");
        let renderer = sh(&format!(
            "echo rendering >&2; touch '{0}'; echo '{0}'",
            target.display()
        ));

        let path = renderer.render_video(&job(dir.path())).await.unwrap();
        assert_eq!(path, target);
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_error_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let err = sh("echo boom >&2; exit 3")
            .render_thumbnail(&job(dir.path()))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("boom"));
    }

    #[tokio::test]
    async fn metadata_must_be_a_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = sh(r#"echo '{"title": "Cats 101", "tags": ["cats"]}'"#)
            .write_metadata(&job(dir.path()))
            .await
            .unwrap();
        assert_eq!(metadata["title"], "Cats 101");

        assert!(sh("echo '[1, 2]'").write_metadata(&job(dir.path())).await.is_err());
    }

    #[test]
    fn upload_receipt_accepts_json_or_plain_url() {
        let receipt = parse_upload_receipt(r#"{"url": "https://youtu.be/abc"}"#).unwrap();
        assert_eq!(receipt.url, "https://youtu.be/abc");

        let receipt = parse_upload_receipt("https://youtu.be/xyz\n").unwrap();
        assert_eq!(receipt.url, "https://youtu.be/xyz");

        assert!(parse_upload_receipt("").is_err());
        assert!(parse_upload_receipt(r#"{"id": 1}"#).is_err());
    }

    #[test]
    fn unset_collaborators_stay_empty() {
        let collaborators = Collaborators::from_settings(&CollaboratorSettings::default());
        assert!(collaborators.video.is_none());
        assert!(collaborators.uploader.is_none());
    }
}
