//! Settings loaded once at startup and handed to every stage.
//!
//! Resolution order for the settings file:
//! 1. Explicit path (command-line flag)
//! 2. `TUBEFORGE_CONFIG` environment variable
//! 3. `<config dir>/tubeforge/config.toml` when it exists
//! 4. Built-in defaults
//!
//! Credentials left empty in the file are filled from the backend's
//! environment variable (`OPENAI_API_KEY`, `ELEVENLABS_API_KEY`, ...).

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    layout::{OutputLayout, get_root_output_dir},
    provider::{SpeechBackend, TextBackend},
    sanitize::default_abbreviations,
};

pub const CONFIG_ENV_VAR: &str = "TUBEFORGE_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub script: ScriptSettings,
    pub voice: VoiceSettings,
    pub batch: BatchSettings,
    pub collaborators: CollaboratorSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    pub providers: Vec<TextProviderSettings>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextProviderSettings {
    pub backend: TextBackend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl TextProviderSettings {
    pub fn new(backend: TextBackend) -> Self {
        Self {
            backend,
            api_key: None,
            model: None,
            api_url: None,
        }
    }

    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.backend.config().model.to_string())
    }

    pub fn api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| self.backend.config().api_url.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub providers: Vec<SpeechProviderSettings>,
    pub speed: f32,
    pub timeout_secs: u64,
    pub local: LocalTtsSettings,
    pub transcode: TranscodeSettings,
    pub abbreviations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechProviderSettings {
    pub backend: SpeechBackend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl SpeechProviderSettings {
    pub fn new(backend: SpeechBackend) -> Self {
        Self {
            backend,
            api_key: None,
            voice: None,
            api_url: None,
        }
    }

    pub fn voice(&self) -> String {
        self.voice
            .clone()
            .unwrap_or_else(|| self.backend.default_voice().to_string())
    }

    pub fn api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| self.backend.config().api_url.to_string())
    }
}

/// Local speech engine driven as an `espeak-ng`-compatible command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalTtsSettings {
    pub program: String,
    pub voice: String,
    pub words_per_minute: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeSettings {
    pub program: String,
    pub codec: String,
    pub extension: String,
    pub bitrate: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub hours_apart: u32,
    pub item_delay_ms: u64,
}

impl BatchSettings {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<CommandSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<CommandSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CommandSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<CommandSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_command_timeout")]
    pub timeout_secs: u64,
}

fn default_command_timeout() -> u64 {
    1800
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: get_root_output_dir(),
            script: ScriptSettings::default(),
            voice: VoiceSettings::default(),
            batch: BatchSettings::default(),
            collaborators: CollaboratorSettings::default(),
        }
    }
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            providers: vec![
                TextProviderSettings::new(TextBackend::Openai),
                TextProviderSettings::new(TextBackend::Huggingface),
            ],
            max_tokens: 2000,
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            providers: vec![
                SpeechProviderSettings::new(SpeechBackend::Elevenlabs),
                SpeechProviderSettings::new(SpeechBackend::Ttsmaker),
            ],
            speed: 1.0,
            timeout_secs: 300,
            local: LocalTtsSettings::default(),
            transcode: TranscodeSettings::default(),
            abbreviations: default_abbreviations(),
        }
    }
}

impl Default for LocalTtsSettings {
    fn default() -> Self {
        Self {
            program: "espeak-ng".to_string(),
            voice: "en".to_string(),
            words_per_minute: 175,
            timeout_secs: 300,
        }
    }
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            codec: "libmp3lame".to_string(),
            extension: "mp3".to_string(),
            bitrate: "128k".to_string(),
            sample_rate: 44100,
            channels: 2,
            timeout_secs: 300,
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            hours_apart: 24,
            item_delay_ms: 2000,
        }
    }
}

/// Find the settings file to load, if any
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    default_config_path().filter(|p| p.exists())
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tubeforge").join("config.toml"))
}

impl Settings {
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let mut settings = match resolve_config_path(cli_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        settings.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Fill credentials that were left empty from the environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for provider in &mut self.script.providers {
            if provider.api_key.is_none() {
                provider.api_key = lookup(provider.backend.config().env_var);
            }
        }
        for provider in &mut self.voice.providers {
            if provider.api_key.is_none() {
                provider.api_key = lookup(provider.backend.config().env_var);
            }
        }
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.output_dir)
    }
}
