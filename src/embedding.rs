//! Embedding gateway abstraction and implementations.
//!
//! Defines the [`EmbeddingClient`] trait and concrete implementations:
//! - **[`OpenAiEmbeddings`]** — calls an OpenAI-compatible `/v1/embeddings`
//!   endpoint with retry and backoff; requires `OPENAI_API_KEY`.
//! - **[`OllamaEmbeddings`]** — calls an Ollama instance's `/api/embed` endpoint.
//!
//! Also provides [`cosine_similarity`], the ranking function used by the
//! vector index.
//!
//! # Retry Strategy
//!
//! Both gateways use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! All failures surface as [`ChatdocsError::EmbeddingUnavailable`]; a missing
//! API key is [`ChatdocsError::InvalidConfiguration`] at construction time,
//! which is fatal at boot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::{ChatdocsError, Result};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Remote capability mapping text to a fixed-length numeric vector.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| ChatdocsError::EmbeddingUnavailable("empty response".to_string()))
    }

    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
}

/// Create the appropriate [`EmbeddingClient`] based on configuration.
///
/// # Errors
///
/// Returns [`ChatdocsError::InvalidConfiguration`] for unknown providers or
/// missing credentials.
pub fn create_client(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiEmbeddings::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbeddings::new(config)?)),
        other => Err(ChatdocsError::InvalidConfiguration(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ChatdocsError::EmbeddingUnavailable(e.to_string()))
}

/// Sleep for the attempt's backoff slot (1s, 2s, 4s, ... capped at 2^5).
async fn backoff(attempt: u32) {
    if attempt > 0 {
        let delay = Duration::from_secs(1 << (attempt - 1).min(5));
        tokio::time::sleep(delay).await;
    }
}

// ============ OpenAI-compatible gateway ============

/// Embedding gateway speaking the OpenAI embeddings API.
///
/// Calls `POST {url}/v1/embeddings` with the configured model. Requires the
/// `OPENAI_API_KEY` environment variable.
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    model: String,
    url: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            ChatdocsError::InvalidConfiguration(
                "OPENAI_API_KEY environment variable not set".to_string(),
            )
        })?;

        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string()),
            api_key,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            backoff(attempt).await;

            let resp = self
                .client
                .post(format!("{}/v1/embeddings", self.url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| ChatdocsError::EmbeddingUnavailable(e.to_string()))?;
                        return parse_openai_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = ChatdocsError::EmbeddingUnavailable(format!(
                        "embeddings API error {}: {}",
                        status, body_text
                    ));

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(ChatdocsError::EmbeddingUnavailable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ChatdocsError::EmbeddingUnavailable("embedding failed after retries".to_string())
        }))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
        ChatdocsError::EmbeddingUnavailable("invalid response: missing data array".to_string())
    })?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                ChatdocsError::EmbeddingUnavailable(
                    "invalid response: missing embedding".to_string(),
                )
            })?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

// ============ Ollama gateway ============

/// Embedding gateway speaking to a local or remote Ollama instance.
///
/// Calls `POST {url}/api/embed` (default `http://localhost:11434`). Requires
/// an embedding model pulled on the Ollama side (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbeddings {
    client: reqwest::Client,
    model: String,
    url: String,
    max_retries: u32,
}

impl OllamaEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string()),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            backoff(attempt).await;

            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| ChatdocsError::EmbeddingUnavailable(e.to_string()))?;
                        return parse_ollama_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = ChatdocsError::EmbeddingUnavailable(format!(
                        "Ollama API error {}: {}",
                        status, body_text
                    ));

                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }

                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(ChatdocsError::EmbeddingUnavailable(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url, e
                    )));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ChatdocsError::EmbeddingUnavailable("embedding failed after retries".to_string())
        }))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            ChatdocsError::EmbeddingUnavailable(
                "invalid response: missing embeddings array".to_string(),
            )
        })?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| {
                ChatdocsError::EmbeddingUnavailable(
                    "invalid response: embedding is not an array".to_string(),
                )
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

// ============ Vector utilities ============

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_empty_or_mismatched_is_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn parse_openai_shape() {
        let json = serde_json::json!({
            "data": [
                {"embedding": [0.1, 0.2], "index": 0},
                {"embedding": [0.3, 0.4], "index": 1}
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.3f32, 0.4f32]);
    }

    #[test]
    fn parse_ollama_shape() {
        let json = serde_json::json!({ "embeddings": [[1.0, 0.0], [0.0, 1.0]] });
        let vectors = parse_ollama_response(&json).unwrap();
        assert_eq!(vectors.len(), 2);
    }

    #[test]
    fn parse_rejects_missing_fields() {
        assert!(parse_openai_response(&serde_json::json!({})).is_err());
        assert!(parse_ollama_response(&serde_json::json!({"embeddings": 3})).is_err());
    }
}
