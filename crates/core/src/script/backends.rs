use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    chain::{Provider, ProviderFailure},
    config::{ScriptSettings, TextProviderSettings},
    provider::TextBackend,
};

use super::prompt::ScriptPrompt;

/// Pull the first non-empty string out of a provider response.
fn require_text(text: Option<&str>, body: &Value) -> Result<String, ProviderFailure> {
    match text.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        Some(_) => Err(ProviderFailure::Transient("empty completion".into())),
        None => Err(ProviderFailure::Transient(format!(
            "Invalid API response structure: {body}"
        ))),
    }
}

/// `/v1/chat/completions` format
pub fn parse_chat_completion(body: &Value) -> Result<String, ProviderFailure> {
    require_text(body["choices"][0]["message"]["content"].as_str(), body)
}

/// HuggingFace inference format: `[{"generated_text": "..."}]`
pub fn parse_generated_text(body: &Value) -> Result<String, ProviderFailure> {
    let text = match body {
        Value::Array(items) => items.first().and_then(|item| item["generated_text"].as_str()),
        other => other["generated_text"].as_str(),
    };
    require_text(text, body)
}

async fn read_json(response: reqwest::Response, name: &str) -> Result<Value, ProviderFailure> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderFailure::Transient(format!(
            "{name} returned {status}: {body}"
        )));
    }
    Ok(response.json::<Value>().await?)
}

/// OpenAI-compatible chat completions endpoint (OpenAI, Grok, Gemini).
pub struct ChatCompletionsProvider {
    backend: TextBackend,
    api_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl ChatCompletionsProvider {
    pub fn new(settings: &TextProviderSettings, script: &ScriptSettings, client: reqwest::Client) -> Self {
        Self {
            backend: settings.backend,
            api_url: settings.api_url(),
            model: settings.model(),
            api_key: settings.api_key.clone(),
            max_tokens: script.max_tokens,
            temperature: script.temperature,
            client,
        }
    }
}

#[async_trait]
impl Provider<ScriptPrompt, String> for ChatCompletionsProvider {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn ensure_configured(&self) -> Result<(), ProviderFailure> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(ProviderFailure::Configuration(format!(
                "{} not set",
                self.backend.config().env_var
            ))),
        }
    }

    async fn attempt(&self, prompt: &ScriptPrompt) -> Result<String, ProviderFailure> {
        let api_key = self.api_key.as_deref().unwrap_or_default();

        let response = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&json!({
                "model": self.model,
                "messages": [
                    {
                        "role": "system",
                        "content": prompt.system,
                    },
                    {
                        "role": "user",
                        "content": prompt.user,
                    },
                ],
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
            }))
            .send()
            .await?;

        let body = read_json(response, self.name()).await?;
        parse_chat_completion(&body)
    }
}

/// Hosted inference for open models. Works without a token, rate limits permitting.
pub struct HuggingFaceProvider {
    url: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl HuggingFaceProvider {
    pub fn new(settings: &TextProviderSettings, script: &ScriptSettings, client: reqwest::Client) -> Self {
        Self {
            url: format!(
                "{}/{}",
                settings.api_url().trim_end_matches('/'),
                settings.model()
            ),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            max_tokens: script.max_tokens,
            temperature: script.temperature,
            client,
        }
    }
}

#[async_trait]
impl Provider<ScriptPrompt, String> for HuggingFaceProvider {
    fn name(&self) -> &str {
        TextBackend::Huggingface.name()
    }

    async fn attempt(&self, prompt: &ScriptPrompt) -> Result<String, ProviderFailure> {
        let mut request = self.client.post(&self.url).json(&json!({
            "inputs": prompt.user,
            "parameters": {
                "max_new_tokens": self.max_tokens,
                "temperature": self.temperature,
                "do_sample": true,
                "return_full_text": false,
            },
        }));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let body = read_json(request.send().await?, self.name()).await?;
        parse_generated_text(&body)
    }
}

/// Build the configured text providers, in configured order.
pub fn build_text_providers(
    script: &ScriptSettings,
    client: &reqwest::Client,
) -> Vec<Arc<dyn Provider<ScriptPrompt, String>>> {
    script
        .providers
        .iter()
        .map(|settings| -> Arc<dyn Provider<ScriptPrompt, String>> {
            match settings.backend {
                TextBackend::Huggingface => {
                    Arc::new(HuggingFaceProvider::new(settings, script, client.clone()))
                }
                _ => Arc::new(ChatCompletionsProvider::new(settings, script, client.clone())),
            }
        })
        .collect()
}
