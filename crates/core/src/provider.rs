use serde::{Deserialize, Serialize};

/// Remote text-generation services a script can be written by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextBackend {
    #[default]
    Openai,
    Grok,
    Gemini,
    Huggingface,
}

/// Remote speech-synthesis services a voice-over can be rendered by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackend {
    #[default]
    Elevenlabs,
    Openai,
    Ttsmaker,
}

pub struct BackendConfig {
    pub api_url: &'static str,
    pub model: &'static str,
    pub env_var: &'static str,
}

impl TextBackend {
    pub fn config(&self) -> BackendConfig {
        match self {
            TextBackend::Openai => BackendConfig {
                api_url: "https://api.openai.com/v1/chat/completions",
                model: "gpt-5.1",
                env_var: "OPENAI_API_KEY",
            },
            TextBackend::Grok => BackendConfig {
                api_url: "https://api.x.ai/v1/chat/completions",
                model: "grok-4-fast",
                env_var: "XAI_API_KEY",
            },
            TextBackend::Gemini => BackendConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                model: "gemini-3-pro",
                env_var: "GEMINI_API_KEY",
            },
            TextBackend::Huggingface => BackendConfig {
                api_url: "https://api-inference.huggingface.co/models",
                model: "gpt2-large",
                env_var: "HF_API_TOKEN",
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextBackend::Openai => "OpenAI",
            TextBackend::Grok => "Grok",
            TextBackend::Gemini => "Gemini",
            TextBackend::Huggingface => "HuggingFace",
        }
    }
}

impl SpeechBackend {
    pub fn config(&self) -> BackendConfig {
        match self {
            SpeechBackend::Elevenlabs => BackendConfig {
                api_url: "https://api.elevenlabs.io/v1/text-to-speech",
                model: "eleven_monolingual_v1",
                env_var: "ELEVENLABS_API_KEY",
            },
            SpeechBackend::Openai => BackendConfig {
                api_url: "https://api.openai.com/v1/audio/speech",
                model: "tts-1",
                env_var: "OPENAI_API_KEY",
            },
            SpeechBackend::Ttsmaker => BackendConfig {
                api_url: "https://ttsmaker.com/api/v1/create-tts-order",
                model: "",
                env_var: "TTSMAKER_API_KEY",
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpeechBackend::Elevenlabs => "ElevenLabs",
            SpeechBackend::Openai => "OpenAI TTS",
            SpeechBackend::Ttsmaker => "TTSMaker",
        }
    }

    pub fn default_voice(&self) -> &'static str {
        match self {
            SpeechBackend::Elevenlabs => "pNInz6obpgDQGcFmaJgB",
            SpeechBackend::Openai => "alloy",
            SpeechBackend::Ttsmaker => "148",
        }
    }
}
