//! Ordered fallback over unreliable providers.
//!
//! A [`ProviderChain`] tries each [`Provider`] in the order it was configured
//! and finishes with a [`TerminalFallback`] that cannot fail, so running a
//! chain always yields a value. Provider failures are logged and recovered
//! here; they never reach the caller.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ProviderFailure {
    /// Provider cannot be used at all (missing credential, missing binary).
    #[error("not configured: {0}")]
    Configuration(String),

    /// Call was made and failed; the next provider may still succeed.
    #[error("{0}")]
    Transient(String),
}

impl ProviderFailure {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ProviderFailure::Configuration(_))
    }
}

impl From<reqwest::Error> for ProviderFailure {
    fn from(e: reqwest::Error) -> Self {
        ProviderFailure::Transient(format!("HTTP error: {e}"))
    }
}

impl From<std::io::Error> for ProviderFailure {
    fn from(e: std::io::Error) -> Self {
        ProviderFailure::Transient(format!("IO error: {e}"))
    }
}

impl From<serde_json::Error> for ProviderFailure {
    fn from(e: serde_json::Error) -> Self {
        ProviderFailure::Transient(format!("Malformed payload: {e}"))
    }
}

#[async_trait]
pub trait Provider<I: Sync, O: Send>: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap pre-check run before any call is made.
    fn ensure_configured(&self) -> Result<(), ProviderFailure> {
        Ok(())
    }

    async fn attempt(&self, input: &I) -> Result<O, ProviderFailure>;
}

#[async_trait]
pub trait TerminalFallback<I: Sync, O: Send>: Send + Sync {
    fn name(&self) -> &str;

    async fn produce(&self, input: &I) -> O;
}

/// Value produced by a chain together with how it was obtained.
#[derive(Debug)]
pub struct Served<O> {
    pub value: O,
    pub served_by: String,
    pub used_fallback: bool,
    pub failures: Vec<(String, ProviderFailure)>,
}

impl<O> Served<O> {
    /// `provider: reason` for every provider that was skipped or failed.
    pub fn failure_notes(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|(name, failure)| format!("{name}: {failure}"))
            .collect()
    }
}

pub struct ProviderChain<I: Sync, O: Send> {
    stage: &'static str,
    providers: Vec<Arc<dyn Provider<I, O>>>,
    fallback: Arc<dyn TerminalFallback<I, O>>,
    attempt_timeout: Duration,
}

impl<I: Sync, O: Send> ProviderChain<I, O> {
    pub fn new(
        stage: &'static str,
        providers: Vec<Arc<dyn Provider<I, O>>>,
        fallback: Arc<dyn TerminalFallback<I, O>>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            stage,
            providers,
            fallback,
            attempt_timeout,
        }
    }

    pub async fn run(&self, input: &I) -> Served<O> {
        let mut failures = Vec::new();

        for provider in &self.providers {
            let name = provider.name();

            if let Err(e) = provider.ensure_configured() {
                debug!(stage = self.stage, provider = name, reason = %e, "skipping provider");
                failures.push((name.to_string(), e));
                continue;
            }

            let outcome = match tokio::time::timeout(self.attempt_timeout, provider.attempt(input))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderFailure::Transient(format!(
                    "timed out after {:?}",
                    self.attempt_timeout
                ))),
            };

            match outcome {
                Ok(value) => {
                    info!(stage = self.stage, provider = name, "provider succeeded");
                    return Served {
                        value,
                        served_by: name.to_string(),
                        used_fallback: false,
                        failures,
                    };
                }
                Err(e) if e.is_configuration() => {
                    debug!(stage = self.stage, provider = name, reason = %e, "skipping provider");
                    failures.push((name.to_string(), e));
                }
                Err(e) => {
                    warn!(stage = self.stage, provider = name, error = %e, "provider failed, trying next");
                    failures.push((name.to_string(), e));
                }
            }
        }

        let fallback = self.fallback.name();
        info!(stage = self.stage, fallback, "running terminal fallback");
        let value = self.fallback.produce(input).await;

        Served {
            value,
            served_by: fallback.to_string(),
            used_fallback: true,
            failures,
        }
    }
}
