//! Text-completion capability
//!
//! The bandit never talks to a model itself. Reward evaluation, subtopic
//! suggestions, topic exploration and reply generation go through
//! [`TextCompletion`], which reports failures as
//! [`CompletionOutcome::Unavailable`] so every caller handles its
//! fallback as an explicit branch.

use crate::types::ChatMessage;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Result of one completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Text(String),
    Unavailable { reason: String },
}

impl CompletionOutcome {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        CompletionOutcome::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn text(self) -> Option<String> {
        match self {
            CompletionOutcome::Text(text) => Some(text),
            CompletionOutcome::Unavailable { .. } => None,
        }
    }
}

/// Anything that can turn role-tagged messages into free text
pub trait TextCompletion {
    fn complete(&self, messages: &[ChatMessage]) -> impl Future<Output = CompletionOutcome> + Send;
}

impl<T: TextCompletion + Send + Sync> TextCompletion for Arc<T> {
    fn complete(&self, messages: &[ChatMessage]) -> impl Future<Output = CompletionOutcome> + Send {
        (**self).complete(messages)
    }
}

/// Settings for the HTTP completion backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat-completions endpoint
    pub api_url: String,

    /// API key (from environment, never serialized)
    #[serde(skip_serializing)]
    pub api_key: String,

    pub model: String,

    pub max_tokens: u32,

    pub temperature: Option<f32>,

    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: std::env::var("RECOMATE_LLM_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: std::env::var("RECOMATE_LLM_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            max_tokens: 512,
            temperature: None,
            timeout_secs: 30,
        }
    }
}

/// `reqwest` client for OpenAI-style chat-completions endpoints
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl HttpCompletionClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            bail!("OPENAI_API_KEY not set. Completion backend requires API access.");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, config })
    }

    /// Build a client, or `None` when the backend is not configured.
    ///
    /// Callers keep working with their fallbacks when this returns `None`.
    pub fn from_config(config: LlmConfig) -> Option<Self> {
        match Self::new(config) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!("completion backend unavailable, using fallbacks: {:#}", e);
                None
            }
        }
    }

    async fn request(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = build_request_body(&self.config, messages);

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("API error {}: {}", status, error_text);
        }

        let json: serde_json::Value = response.json().await?;
        extract_content(&json).ok_or_else(|| anyhow!("completion response had no message content"))
    }
}

impl TextCompletion for HttpCompletionClient {
    async fn complete(&self, messages: &[ChatMessage]) -> CompletionOutcome {
        match self.request(messages).await {
            Ok(text) => CompletionOutcome::Text(text),
            Err(e) => {
                tracing::debug!(model = %self.config.model, "completion failed: {:#}", e);
                CompletionOutcome::unavailable(format!("{:#}", e))
            }
        }
    }
}

fn build_request_body(config: &LlmConfig, messages: &[ChatMessage]) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "messages": messages,
    });
    if let Some(temperature) = config.temperature {
        body["temperature"] = serde_json::json!(temperature);
    }
    body
}

fn extract_content(json: &serde_json::Value) -> Option<String> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
}


#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LlmConfig {
        LlmConfig {
            api_url: "http://localhost:0/v1/chat/completions".to_string(),
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            max_tokens: 64,
            temperature: Some(0.5),
            timeout_secs: 1,
        }
    }

    #[test]
    fn test_missing_key_means_no_client() {
        let mut cfg = config();
        cfg.api_key.clear();
        assert!(HttpCompletionClient::new(cfg.clone()).is_err());
        assert!(HttpCompletionClient::from_config(cfg).is_none());
    }

    #[test]
    fn test_request_body_shape() {
        let body = build_request_body(
            &config(),
            &[ChatMessage::system("be kind"), ChatMessage::user("hi")],
        );
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body["temperature"].is_number());
    }

    #[test]
    fn test_extract_content() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  hello \n"}}]
        });
        assert_eq!(extract_content(&json).as_deref(), Some("hello"));
        assert_eq!(extract_content(&serde_json::json!({"error": "nope"})), None);
    }

    #[test]
    fn test_api_key_not_serialized() {
        let json = serde_json::to_value(config()).unwrap();
        assert!(json.get("api_key").is_none());
    }

    #[test]
    fn test_unreachable_backend_is_unavailable() {
        let client = HttpCompletionClient::new(config()).unwrap();
        let outcome = tokio_test::block_on(client.complete(&[ChatMessage::user("hi")]));
        assert!(matches!(outcome, CompletionOutcome::Unavailable { .. }));
    }
}
