//! Script stage: write narration for a topic, then segment it.

pub mod backends;
pub mod prompt;
pub mod structure;
pub mod template;

use std::{path::Path, sync::Arc, time::Duration};

use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::{
    chain::{Provider, ProviderChain},
    config::Settings,
    error::{Result, TubeforgeError},
    layout::OutputLayout,
    types::{AssetId, ScriptResult},
};

pub use backends::{ChatCompletionsProvider, HuggingFaceProvider, build_text_providers};
pub use prompt::{ScriptPrompt, Tone};
pub use template::{TemplateFallback, render_template};

pub struct ScriptStage {
    chain: ProviderChain<ScriptPrompt, String>,
    layout: OutputLayout,
}

impl ScriptStage {
    pub fn new(
        providers: Vec<Arc<dyn Provider<ScriptPrompt, String>>>,
        layout: OutputLayout,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            chain: ProviderChain::new("script", providers, Arc::new(TemplateFallback), attempt_timeout),
            layout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let client = reqwest::Client::new();
        Self::new(
            build_text_providers(&settings.script, &client),
            settings.layout(),
            Duration::from_secs(settings.script.timeout_secs),
        )
    }

    /// Write and segment a script. Always succeeds; the template covers every
    /// provider failing.
    pub async fn compose(&self, topic: &str, audience: &str, tone: &str) -> ScriptResult {
        let prompt = ScriptPrompt::build(topic, audience, tone);
        let served = self.chain.run(&prompt).await;

        let recovered_failures = served.failure_notes();
        let mut result = structure::structure(served.value, &served.served_by);
        result.recovered_failures = recovered_failures;
        info!(
            provider = %result.provider,
            words = result.word_count,
            sections = result.sections.len(),
            "script composed"
        );
        result
    }

    /// Compose a script and persist its text under the asset id.
    pub async fn generate(
        &self,
        id: &AssetId,
        topic: &str,
        audience: &str,
        tone: &str,
    ) -> Result<ScriptResult> {
        let result = self.compose(topic, audience, tone).await;
        write_once(&self.layout.script_path(id), &result.text).await?;
        Ok(result)
    }
}

/// Write a file that must not already exist.
async fn write_once(path: &Path, content: &str) -> Result<()> {
    let failed = |e: std::io::Error| TubeforgeError::WriteFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(failed)?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(failed)?;
    file.write_all(content.as_bytes()).await.map_err(failed)?;
    file.flush().await.map_err(failed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::chain::ProviderFailure;

    struct Down;

    #[async_trait]
    impl Provider<ScriptPrompt, String> for Down {
        fn name(&self) -> &str {
            "down"
        }

        async fn attempt(&self, _prompt: &ScriptPrompt) -> std::result::Result<String, ProviderFailure> {
            Err(ProviderFailure::Transient("503".into()))
        }
    }

    struct Canned;

    #[async_trait]
    impl Provider<ScriptPrompt, String> for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn attempt(&self, prompt: &ScriptPrompt) -> std::result::Result<String, ProviderFailure> {
            Ok(format!("A short script about {}.", prompt.topic))
        }
    }

    type DynProvider = Arc<dyn Provider<ScriptPrompt, String>>;

    fn stage(providers: Vec<DynProvider>, root: &Path) -> ScriptStage {
        ScriptStage::new(providers, OutputLayout::new(root), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn falls_back_to_template_when_providers_fail() {
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(vec![Arc::new(Down) as DynProvider], dir.path());

        let result = stage.compose("Cats", "pet owners", "funny").await;

        assert_eq!(result.provider, "template");
        assert!(result.text.contains("Cats"));
        assert!(result.text.contains("pet owners"));
        assert!(result.word_count > 0);
        assert!(!result.sections.is_empty());
        assert_eq!(result.recovered_failures, vec!["down: 503"]);
    }

    #[tokio::test]
    async fn generate_writes_script_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(vec![Arc::new(Down) as DynProvider, Arc::new(Canned)], dir.path());
        let id = AssetId::from("video_test");

        let result = stage.generate(&id, "Rust", "devs", "educational").await.unwrap();
        assert_eq!(result.provider, "canned");
        assert_eq!(result.recovered_failures, vec!["down: 503"]);

        let path = dir.path().join("scripts").join("video_test_script.txt");
        let on_disk = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(on_disk, "A short script about Rust.");

        let again = stage.generate(&id, "Rust", "devs", "educational").await;
        assert!(matches!(again, Err(TubeforgeError::WriteFailed { .. })));
    }
}
