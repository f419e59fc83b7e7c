//! Completion providers and the failover router.
//!
//! Providers share one narrow trait: a system prompt plus a user prompt in,
//! one completion out. The router owns the retry and failover policy so
//! callers never see a transient provider hiccup.
pub mod groq;
pub mod mock;
pub mod ollama;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::config::LlmConfig;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("provider returned error status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("provider returned an empty completion")]
    EmptyCompletion,

    #[error("all providers exhausted, last error: {0}")]
    Exhausted(String),

    #[error("no provider configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    /// Transient failures are retried once on the same provider before
    /// failing over. Config and auth problems are not.
    fn is_transient(&self) -> bool {
        match self {
            LlmError::Request(_) | LlmError::Timeout(_) | LlmError::EmptyCompletion => true,
            LlmError::Api { status, .. } => *status >= 500 || *status == 429,
            LlmError::Exhausted(_) | LlmError::NotConfigured(_) => false,
        }
    }
}

/// A chat completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// One completion from a system prompt and a user prompt.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Short provider name for logs and response metadata.
    fn name(&self) -> &str;
}

/// Ordered provider chain with retry-once-then-failover semantics.
///
/// The per-query call pattern is one attempt plus at most one retry per
/// provider; when a provider is exhausted the router moves to the next
/// one. Only after every provider fails does the caller see an error.
pub struct LlmRouter {
    providers: Vec<Arc<dyn LlmProvider>>,
}

impl LlmRouter {
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>) -> Self {
        Self { providers }
    }

    /// Build the provider chain from config.
    ///
    /// `groq` and `ollama` select one provider each; `auto` prefers Groq
    /// when an API key is present and falls back to Ollama.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self, LlmError> {
        let groq_key = cfg
            .groq_api_key
            .clone()
            .or_else(|| std::env::var("GROQ_API_KEY").ok());

        let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::new();

        match cfg.provider.as_str() {
            "groq" => {
                let key = groq_key.ok_or_else(|| {
                    LlmError::NotConfigured("groq selected but GROQ_API_KEY is not set".into())
                })?;
                providers.push(Arc::new(groq::GroqProvider::new(cfg, key)));
            }
            "ollama" => {
                providers.push(Arc::new(ollama::OllamaProvider::new(cfg)));
            }
            "auto" => {
                if let Some(key) = groq_key {
                    providers.push(Arc::new(groq::GroqProvider::new(cfg, key)));
                }
                providers.push(Arc::new(ollama::OllamaProvider::new(cfg)));
            }
            other => {
                return Err(LlmError::NotConfigured(format!(
                    "unknown provider: {other}"
                )));
            }
        }

        Ok(Self { providers })
    }

    pub async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let mut last_error = String::from("no providers configured");

        for provider in &self.providers {
            match provider.complete(system, user).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() => {
                    warn!("Provider {} failed, retrying once: {e}", provider.name());
                    match provider.complete(system, user).await {
                        Ok(text) => return Ok(text),
                        Err(retry_err) => {
                            warn!(
                                "Provider {} failed on retry, failing over: {retry_err}",
                                provider.name()
                            );
                            last_error = retry_err.to_string();
                        }
                    }
                }
                Err(e) => {
                    warn!("Provider {} failed, failing over: {e}", provider.name());
                    last_error = e.to_string();
                }
            }
        }

        Err(LlmError::Exhausted(last_error))
    }

    /// Name of the first provider in the chain, for response metadata.
    #[must_use]
    pub fn primary_name(&self) -> &str {
        self.providers.first().map_or("none", |p| p.name())
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockProvider;
    use super::*;

    #[tokio::test]
    async fn test_router_uses_first_healthy_provider() {
        let a = Arc::new(MockProvider::scripted("alpha", vec![Ok("answer".into())]));
        let providers: Vec<Arc<dyn LlmProvider>> = vec![a.clone()];
        let router = LlmRouter::new(providers);

        let out = router.complete("sys", "user").await.unwrap();
        assert_eq!(out, "answer");
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn test_router_retries_transient_then_fails_over() {
        let a = Arc::new(MockProvider::scripted(
            "alpha",
            vec![
                Err(LlmError::Timeout(30)),
                Err(LlmError::Timeout(30)),
            ],
        ));
        let b = Arc::new(MockProvider::scripted("beta", vec![Ok("backup".into())]));
        let providers: Vec<Arc<dyn LlmProvider>> = vec![a.clone(), b.clone()];
        let router = LlmRouter::new(providers);

        let out = router.complete("sys", "user").await.unwrap();
        assert_eq!(out, "backup");
        assert_eq!(a.calls(), 2, "transient error retried exactly once");
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_router_skips_retry_on_permanent_error() {
        let a = Arc::new(MockProvider::scripted(
            "alpha",
            vec![Err(LlmError::Api {
                status: 401,
                body: "bad key".into(),
            })],
        ));
        let b = Arc::new(MockProvider::scripted("beta", vec![Ok("backup".into())]));
        let providers: Vec<Arc<dyn LlmProvider>> = vec![a.clone(), b];
        let router = LlmRouter::new(providers);

        let out = router.complete("sys", "user").await.unwrap();
        assert_eq!(out, "backup");
        assert_eq!(a.calls(), 1, "auth error must not be retried");
    }

    #[tokio::test]
    async fn test_router_exhausted() {
        let a = Arc::new(MockProvider::scripted(
            "alpha",
            vec![
                Err(LlmError::Timeout(30)),
                Err(LlmError::Timeout(30)),
            ],
        ));
        let providers: Vec<Arc<dyn LlmProvider>> = vec![a];
        let router = LlmRouter::new(providers);

        let err = router.complete("sys", "user").await.unwrap_err();
        assert!(matches!(err, LlmError::Exhausted(_)));
    }
}
