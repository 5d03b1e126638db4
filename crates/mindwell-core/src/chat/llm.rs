//! Text-completion collaborator.
//!
//! The companion model is a black box behind [`LlmClient`]: one call in,
//! one completion out. [`AnthropicClient`] is the production
//! implementation against the hosted messages endpoint.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::LlmError;
use crate::storage::LlmConfig;

use super::Role;

/// One turn of conversation context sent to the completion API.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionTurn {
    pub role: Role,
    pub content: String,
}

/// Black-box text completion.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        messages: &[CompletionTurn],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError>;
}

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the hosted Claude messages endpoint.
#[derive(Debug)]
pub struct AnthropicClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: ANTHROPIC_API_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Build a client from configuration. A missing API key is fatal here
    /// rather than on every later call.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self, LlmError> {
        if cfg.api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        Ok(Self::new(cfg.api_key.clone(), cfg.model.clone()))
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(
        &self,
        system: &str,
        messages: &[CompletionTurn],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "system": system,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload: Value = response.json().await?;
        payload["content"][0]["text"]
            .as_str()
            .map(str::to_owned)
            .ok_or(LlmError::EmptyCompletion)
    }
}
