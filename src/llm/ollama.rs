//! Ollama chat completion provider for local models.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{LlmError, LlmProvider};
use crate::config::LlmConfig;

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

impl OllamaProvider {
    pub fn new(cfg: &LlmConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: cfg.ollama_url.trim_end_matches('/').to_string(),
            model: cfg.ollama_model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            timeout_secs: cfg.timeout_secs,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = OllamaRequest {
            model: self.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: system.to_string(),
                },
                OllamaMessage {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Request(format!("invalid response body: {e}")))?;

        let content = parsed.message.content.trim().to_string();
        if content.is_empty() {
            return Err(LlmError::EmptyCompletion);
        }

        Ok(content)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
