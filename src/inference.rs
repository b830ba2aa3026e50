//! Text-completion provider abstraction.
//!
//! Defines the [`InferenceProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]** — returns errors; used when inference is not configured.
//! - **[`OpenAiChatProvider`]** — calls an OpenAI-compatible chat completions API.
//!
//! The analysis engine makes exactly one attempt per document and falls back
//! to the simulated analyzer on any failure, so providers here do not retry:
//! rate limits, quota errors, and transport failures all surface as a single
//! error and the caller recovers locally.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::InferenceConfig;

/// A remote text-completion capability: prompt in, completion text out.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Run one completion. Implementations make a single bounded-timeout
    /// attempt; any failure mode is an error.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// A no-op provider that always returns errors.
///
/// Used when `inference.provider = "disabled"` in the configuration; the
/// engine then runs on the simulated fallback for every document.
pub struct DisabledProvider;

#[async_trait]
impl InferenceProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("Inference provider is disabled")
    }
}

/// Provider for OpenAI-compatible chat completion endpoints.
///
/// Requires the `OPENAI_API_KEY` environment variable. The base URL is
/// configurable so self-hosted OpenAI-compatible servers work too.
pub struct OpenAiChatProvider {
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiChatProvider {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("inference.model required for OpenAI provider"))?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl InferenceProvider for OpenAiChatProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.0,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Inference API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }
}

/// Extract the first choice's message content from a chat completion
/// response.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))
}

/// Create the appropriate [`InferenceProvider`] based on configuration.
pub fn create_provider(config: &InferenceConfig) -> Result<Arc<dyn InferenceProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAiChatProvider::new(config)?)),
        other => bail!("Unknown inference provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_chat_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"keywords\": []}" } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "{\"keywords\": []}");
    }

    #[test]
    fn parse_missing_choices_fails() {
        let json = serde_json::json!({ "error": { "message": "rate limited" } });
        assert!(parse_chat_response(&json).is_err());
    }

    #[test]
    fn parse_empty_choices_fails() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_chat_response(&json).is_err());
    }

    #[tokio::test]
    async fn disabled_provider_errors() {
        assert!(DisabledProvider.complete("hello").await.is_err());
    }
}
