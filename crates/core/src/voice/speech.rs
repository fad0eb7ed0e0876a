//! Remote speech-synthesis services.

use std::{path::{Path, PathBuf}, sync::Arc};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    chain::{Provider, ProviderFailure},
    config::{SpeechProviderSettings, VoiceSettings},
    provider::SpeechBackend,
};

use super::{SpeechRequest, commit_staged, stage_beside, with_extension};

fn require_key(key: Option<&str>, backend: SpeechBackend) -> Result<(), ProviderFailure> {
    match key {
        Some(key) if !key.trim().is_empty() => Ok(()),
        _ => Err(ProviderFailure::Configuration(format!(
            "{} not set",
            backend.config().env_var
        ))),
    }
}

async fn audio_bytes(response: reqwest::Response, name: &str) -> Result<Vec<u8>, ProviderFailure> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderFailure::Transient(format!(
            "{name} returned {status}: {body}"
        )));
    }
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(ProviderFailure::Transient(format!("{name} returned no audio")));
    }
    Ok(bytes.to_vec())
}

/// Write the audio beside `path` and move it into place once complete.
async fn save_audio(path: &Path, bytes: &[u8]) -> Result<PathBuf, ProviderFailure> {
    let staged = stage_beside(path)?;
    tokio::fs::write(&staged, bytes).await?;
    commit_staged(staged, path)
}

pub struct ElevenLabsProvider {
    api_url: String,
    voice: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ElevenLabsProvider {
    pub fn new(settings: &SpeechProviderSettings, client: reqwest::Client) -> Self {
        Self {
            api_url: settings.api_url(),
            voice: settings.voice(),
            api_key: settings.api_key.clone(),
            client,
        }
    }
}

#[async_trait]
impl Provider<SpeechRequest, PathBuf> for ElevenLabsProvider {
    fn name(&self) -> &str {
        SpeechBackend::Elevenlabs.name()
    }

    fn ensure_configured(&self) -> Result<(), ProviderFailure> {
        require_key(self.api_key.as_deref(), SpeechBackend::Elevenlabs)
    }

    async fn attempt(&self, request: &SpeechRequest) -> Result<PathBuf, ProviderFailure> {
        let config = SpeechBackend::Elevenlabs.config();
        let response = self
            .client
            .post(format!("{}/{}", self.api_url.trim_end_matches('/'), self.voice))
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", self.api_key.as_deref().unwrap_or_default())
            .json(&json!({
                "text": request.text,
                "model_id": config.model,
                "voice_settings": {
                    "stability": 0.5,
                    "similarity_boost": 0.5,
                    "speed": request.speed,
                },
            }))
            .send()
            .await?;

        let bytes = audio_bytes(response, self.name()).await?;
        save_audio(&with_extension(&request.output_base, "mp3"), &bytes).await
    }
}

pub struct OpenAiSpeechProvider {
    api_url: String,
    voice: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiSpeechProvider {
    pub fn new(settings: &SpeechProviderSettings, client: reqwest::Client) -> Self {
        Self {
            api_url: settings.api_url(),
            voice: settings.voice(),
            api_key: settings.api_key.clone(),
            client,
        }
    }
}

#[async_trait]
impl Provider<SpeechRequest, PathBuf> for OpenAiSpeechProvider {
    fn name(&self) -> &str {
        SpeechBackend::Openai.name()
    }

    fn ensure_configured(&self) -> Result<(), ProviderFailure> {
        require_key(self.api_key.as_deref(), SpeechBackend::Openai)
    }

    async fn attempt(&self, request: &SpeechRequest) -> Result<PathBuf, ProviderFailure> {
        let config = SpeechBackend::Openai.config();
        let response = self
            .client
            .post(&self.api_url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.as_deref().unwrap_or_default()),
            )
            .json(&json!({
                "model": config.model,
                "input": request.text,
                "voice": self.voice,
                "speed": request.speed,
                "response_format": "mp3",
            }))
            .send()
            .await?;

        let bytes = audio_bytes(response, self.name()).await?;
        save_audio(&with_extension(&request.output_base, "mp3"), &bytes).await
    }
}

/// Free TTS service: create an order, then download the rendered file.
pub struct TtsMakerProvider {
    api_url: String,
    voice: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl TtsMakerProvider {
    pub fn new(settings: &SpeechProviderSettings, client: reqwest::Client) -> Self {
        Self {
            api_url: settings.api_url(),
            voice: settings.voice(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            client,
        }
    }
}

pub fn parse_order_audio_url(body: &Value) -> Result<String, ProviderFailure> {
    body["audio_url"]
        .as_str()
        .or_else(|| body["audio_download_url"].as_str())
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderFailure::Transient(format!("No audio URL in response: {body}")))
}

#[async_trait]
impl Provider<SpeechRequest, PathBuf> for TtsMakerProvider {
    fn name(&self) -> &str {
        SpeechBackend::Ttsmaker.name()
    }

    async fn attempt(&self, request: &SpeechRequest) -> Result<PathBuf, ProviderFailure> {
        let mut order = json!({
            "text": request.text,
            "voice_id": self.voice,
            "audio_format": "mp3",
            "audio_speed": request.speed,
            "audio_volume": 1.0,
        });
        if let Some(token) = &self.api_key {
            order["token"] = json!(token);
        }

        let response = self.client.post(&self.api_url).json(&order).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderFailure::Transient(format!(
                "{} returned {status}",
                self.name()
            )));
        }
        let audio_url = parse_order_audio_url(&response.json::<Value>().await?)?;

        let download = self.client.get(&audio_url).send().await?;
        let bytes = audio_bytes(download, self.name()).await?;
        save_audio(&with_extension(&request.output_base, "mp3"), &bytes).await
    }
}

pub fn build_speech_providers(
    voice: &VoiceSettings,
    client: &reqwest::Client,
) -> Vec<Arc<dyn Provider<SpeechRequest, PathBuf>>> {
    voice
        .providers
        .iter()
        .map(|settings| -> Arc<dyn Provider<SpeechRequest, PathBuf>> {
            match settings.backend {
                SpeechBackend::Elevenlabs => {
                    Arc::new(ElevenLabsProvider::new(settings, client.clone()))
                }
                SpeechBackend::Openai => {
                    Arc::new(OpenAiSpeechProvider::new(settings, client.clone()))
                }
                SpeechBackend::Ttsmaker => Arc::new(TtsMakerProvider::new(settings, client.clone())),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_services_need_credentials() {
        let client = reqwest::Client::new();
        let eleven = ElevenLabsProvider::new(
            &SpeechProviderSettings::new(SpeechBackend::Elevenlabs),
            client.clone(),
        );
        let err = eleven.ensure_configured().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("ELEVENLABS_API_KEY"));

        let mut settings = SpeechProviderSettings::new(SpeechBackend::Openai);
        settings.api_key = Some("sk-test".into());
        assert!(OpenAiSpeechProvider::new(&settings, client.clone())
            .ensure_configured()
            .is_ok());

        let ttsmaker = TtsMakerProvider::new(&SpeechProviderSettings::new(SpeechBackend::Ttsmaker), client);
        assert!(ttsmaker.ensure_configured().is_ok());
    }

    #[test]
    fn order_response_must_carry_audio_url() {
        let ok = json!({"status": "success", "audio_url": "https://cdn.example/a.mp3"});
        assert_eq!(parse_order_audio_url(&ok).unwrap(), "https://cdn.example/a.mp3");

        let missing = json!({"status": "error", "error_summary": "quota"});
        assert!(matches!(
            parse_order_audio_url(&missing),
            Err(ProviderFailure::Transient(_))
        ));
    }

    #[tokio::test]
    async fn saves_audio_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp3");
        let saved = save_audio(&path, b"ID3").await.unwrap();
        assert_eq!(tokio::fs::read(saved).await.unwrap(), b"ID3");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.mp3");
        assert!(save_audio(&path, b"ID3").await.is_err());
        assert!(!path.exists());
    }
}
