//! Generation gateway abstraction and implementations.
//!
//! Defines the [`GenerationClient`] trait and concrete implementations:
//! - **[`OpenAiGeneration`]** — calls an OpenAI-compatible
//!   `/v1/chat/completions` endpoint; requires `OPENAI_API_KEY`.
//! - **[`OllamaGeneration`]** — calls an Ollama instance's `/api/chat` endpoint.
//!
//! A generation request carries the retrieved context, the prior transcript,
//! and the new question. The grounding instruction and context go into a
//! system message; the transcript is replayed as alternating user/assistant
//! messages; the question is appended last.
//!
//! Retry/backoff/timeout behavior matches the embedding gateway. Failures
//! surface as [`ChatdocsError::GenerationUnavailable`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::{ChatdocsError, Result};
use crate::models::{Role, Turn};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Remote capability producing an answer from retrieved context, prior
/// turns, and the new question.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, context: &str, history: &[Turn], question: &str) -> Result<String>;

    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;
}

/// Create the appropriate [`GenerationClient`] based on configuration.
///
/// # Errors
///
/// Returns [`ChatdocsError::InvalidConfiguration`] for unknown providers or
/// missing credentials.
pub fn create_client(config: &GenerationConfig) -> Result<Arc<dyn GenerationClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiGeneration::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGeneration::new(config)?)),
        other => Err(ChatdocsError::InvalidConfiguration(format!(
            "unknown generation provider: {}",
            other
        ))),
    }
}

/// Builds the system message grounding the answer in the retrieved context.
fn system_message(context: &str) -> String {
    format!(
        "You are a helpful assistant that answers questions based on the provided context.\n\
         If the answer is not present in the context, state clearly that you don't have \
         enough information from the document to answer the question.\n\
         Do not make up information or refer to external knowledge unless explicitly asked.\n\n\
         Context:\n{}",
        context
    )
}

/// Converts the system prompt, transcript, and question into the chat
/// message list shared by both gateway APIs.
fn build_messages(context: &str, history: &[Turn], question: &str) -> Vec<serde_json::Value> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(serde_json::json!({
        "role": "system",
        "content": system_message(context),
    }));
    for turn in history {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        messages.push(serde_json::json!({
            "role": role,
            "content": turn.content,
        }));
    }
    messages.push(serde_json::json!({
        "role": "user",
        "content": question,
    }));
    messages
}

fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ChatdocsError::GenerationUnavailable(e.to_string()))
}

async fn backoff(attempt: u32) {
    if attempt > 0 {
        let delay = Duration::from_secs(1 << (attempt - 1).min(5));
        tokio::time::sleep(delay).await;
    }
}

// ============ OpenAI-compatible gateway ============

/// Generation gateway speaking the OpenAI chat-completions API.
pub struct OpenAiGeneration {
    client: reqwest::Client,
    model: String,
    url: String,
    api_key: String,
    temperature: f64,
    max_retries: u32,
}

impl OpenAiGeneration {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
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
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl GenerationClient for OpenAiGeneration {
    async fn generate(&self, context: &str, history: &[Turn], question: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": build_messages(context, history, question),
            "temperature": self.temperature,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            backoff(attempt).await;

            let resp = self
                .client
                .post(format!("{}/v1/chat/completions", self.url))
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
                            .map_err(|e| ChatdocsError::GenerationUnavailable(e.to_string()))?;
                        return parse_openai_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = ChatdocsError::GenerationUnavailable(format!(
                        "chat completions API error {}: {}",
                        status, body_text
                    ));

                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }

                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(ChatdocsError::GenerationUnavailable(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ChatdocsError::GenerationUnavailable("generation failed after retries".to_string())
        }))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            ChatdocsError::GenerationUnavailable(
                "invalid response: missing choices[0].message.content".to_string(),
            )
        })
}

// ============ Ollama gateway ============

/// Generation gateway speaking to a local or remote Ollama instance via
/// `POST {url}/api/chat` (non-streaming).
pub struct OllamaGeneration {
    client: reqwest::Client,
    model: String,
    url: String,
    temperature: f64,
    max_retries: u32,
}

impl OllamaGeneration {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string()),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl GenerationClient for OllamaGeneration {
    async fn generate(&self, context: &str, history: &[Turn], question: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": build_messages(context, history, question),
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            backoff(attempt).await;

            let resp = self
                .client
                .post(format!("{}/api/chat", self.url))
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
                            .map_err(|e| ChatdocsError::GenerationUnavailable(e.to_string()))?;
                        return parse_ollama_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = ChatdocsError::GenerationUnavailable(format!(
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
                    last_err = Some(ChatdocsError::GenerationUnavailable(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url, e
                    )));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ChatdocsError::GenerationUnavailable("generation failed after retries".to_string())
        }))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<String> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            ChatdocsError::GenerationUnavailable(
                "invalid response: missing message.content".to_string(),
            )
        })
}
