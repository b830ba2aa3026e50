//! Embedding provider abstraction and the embedding service.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]** — returns errors; used when embeddings are not configured.
//! - **[`OpenAiEmbeddingProvider`]** — calls an OpenAI-compatible embeddings API.
//!
//! [`EmbeddingService::embed_document`] wraps a provider and always returns
//! a vector of exactly [`DIMS`] floats: input is truncated to a fixed
//! character budget, the provider gets a single bounded-timeout attempt, and
//! any failure (including a wrong-dimension response) yields a uniform
//! random fallback vector so downstream code never branches on "no
//! embedding". The fallback is explicitly non-deterministic.
//!
//! Also provides vector utilities:
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes for SQLite BLOB storage
//! - [`blob_to_vec`] — decode a SQLite BLOB back into a `Vec<f32>`

use anyhow::{bail, Result};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::config::EmbeddingConfig;
use crate::error::PipelineError;

/// Fixed embedding dimensionality. Vectors of any other length are rejected
/// at persistence.
pub const DIMS: usize = 1536;

/// Characters of input text sent to the provider.
const EMBED_CHAR_BUDGET: usize = 8_000;

/// A remote embedding capability: text in, one vector out.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed a single text. Single bounded-timeout attempt; any failure
    /// mode is an error.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// A no-op embedding provider that always returns errors, which routes
/// every document through the random fallback.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

/// Provider for OpenAI-compatible embedding endpoints.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiEmbeddingProvider {
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;

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
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Embedding API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_embedding_response(&json)
    }
}

/// Extract `data[0].embedding` from an embeddings API response.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: missing data[0].embedding"))?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAiEmbeddingProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embedding generation with guaranteed output shape.
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> EmbeddingService {
        EmbeddingService { provider }
    }

    /// Embed a document body. Always returns exactly [`DIMS`] floats.
    pub async fn embed_document(&self, text: &str) -> Vec<f32> {
        let input: String = text.chars().take(EMBED_CHAR_BUDGET).collect();

        let attempt = match self.provider.embed(&input).await {
            Ok(vector) if vector.len() == DIMS => Ok(vector),
            Ok(vector) => Err(PipelineError::EmbeddingProvider(format!(
                "provider returned {} dimensions, expected {}",
                vector.len(),
                DIMS
            ))),
            Err(e) => Err(PipelineError::EmbeddingProvider(e.to_string())),
        };

        match attempt {
            Ok(vector) => vector,
            Err(e) => {
                warn!(
                    model = self.provider.model_name(),
                    error = %e,
                    "embedding failed, using random fallback"
                );
                fallback_vector()
            }
        }
    }
}

/// A vector of [`DIMS`] uniform samples from [-1, 1].
pub fn fallback_vector() -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..DIMS).map(|_| rng.gen_range(-1.0f32..=1.0)).collect()
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector. Reverses [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WrongDimsProvider;

    #[async_trait]
    impl EmbeddingProvider for WrongDimsProvider {
        fn model_name(&self) -> &str {
            "wrong-dims"
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.5; 100])
        }
    }

    struct CapturingProvider {
        seen_len: std::sync::Mutex<Option<usize>>,
    }

    #[async_trait]
    impl EmbeddingProvider for CapturingProvider {
        fn model_name(&self) -> &str {
            "capturing"
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            *self.seen_len.lock().unwrap() = Some(text.chars().count());
            Ok(vec![0.25; DIMS])
        }
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn fallback_has_exact_dims_and_range() {
        let vector = fallback_vector();
        assert_eq!(vector.len(), DIMS);
        assert!(vector.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn parse_valid_embedding_response() {
        let json = serde_json::json!({ "data": [{ "embedding": [0.1, 0.2, 0.3] }] });
        let vector = parse_embedding_response(&json).unwrap();
        assert_eq!(vector.len(), 3);
        assert!((vector[1] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn parse_missing_data_fails() {
        let json = serde_json::json!({ "error": { "message": "quota exceeded" } });
        assert!(parse_embedding_response(&json).is_err());
    }

    #[tokio::test]
    async fn disabled_provider_yields_fallback_of_exact_dims() {
        let service = EmbeddingService::new(Arc::new(DisabledProvider));
        let vector = service.embed_document("some text").await;
        assert_eq!(vector.len(), DIMS);
    }

    #[tokio::test]
    async fn wrong_dims_response_yields_fallback() {
        let service = EmbeddingService::new(Arc::new(WrongDimsProvider));
        let vector = service.embed_document("some text").await;
        assert_eq!(vector.len(), DIMS);
        // The 100-dim provider vector must not leak through.
        assert_ne!(&vector[..100], &[0.5f32; 100][..]);
    }

    #[tokio::test]
    async fn input_is_truncated_to_char_budget() {
        let provider = Arc::new(CapturingProvider {
            seen_len: std::sync::Mutex::new(None),
        });
        let service = EmbeddingService::new(provider.clone());
        let text = "x".repeat(EMBED_CHAR_BUDGET * 2);
        let vector = service.embed_document(&text).await;
        assert_eq!(vector.len(), DIMS);
        assert_eq!(*provider.seen_len.lock().unwrap(), Some(EMBED_CHAR_BUDGET));
    }
}
