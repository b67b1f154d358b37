//! Test utilities for chatdocs.
//!
//! Deterministic in-process gateway stubs implementing [`EmbeddingClient`]
//! and [`GenerationClient`], so lifecycle and engine behavior can be tested
//! without a network. Used by unit tests and the `tests/` scenario suite.

use async_trait::async_trait;

use crate::embedding::EmbeddingClient;
use crate::error::{ChatdocsError, Result};
use crate::generation::GenerationClient;
use crate::models::Turn;

/// Embeds text as keyword-presence vectors over a fixed vocabulary: one
/// dimension per vocabulary word, `1.0` when the lowercased text contains
/// the word. Deterministic, so retrieval rankings are fully predictable.
pub struct KeywordEmbedder {
    vocabulary: Vec<String>,
}

impl KeywordEmbedder {
    pub fn with_vocabulary(words: &[&str]) -> Self {
        Self {
            vocabulary: words.iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    /// Vocabulary covering the capital-city scenario documents.
    pub fn capitals() -> Self {
        Self::with_vocabulary(&["france", "paris", "japan", "tokyo"])
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        self.vocabulary
            .iter()
            .map(|word| if lower.contains(word.as_str()) { 1.0 } else { 0.0 })
            .collect()
    }
}

#[async_trait]
impl EmbeddingClient for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn model_name(&self) -> &str {
        "keyword-stub"
    }
}

/// Embedding gateway that always fails, for upstream-failure paths.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingClient for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(ChatdocsError::EmbeddingUnavailable(
            "stub: embedding gateway down".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        "failing-embedder-stub"
    }
}

/// Answers with the top-ranked retrieved chunk (the first context line), so
/// assertions can check the answer is grounded in the right document.
pub struct EchoGenerator;

#[async_trait]
impl GenerationClient for EchoGenerator {
    async fn generate(&self, context: &str, _history: &[Turn], _question: &str) -> Result<String> {
        Ok(context.lines().next().unwrap_or("no context").to_string())
    }

    fn model_name(&self) -> &str {
        "echo-stub"
    }
}

/// Generation gateway that always fails, for upstream-failure paths.
pub struct FailingGenerator;

#[async_trait]
impl GenerationClient for FailingGenerator {
    async fn generate(
        &self,
        _context: &str,
        _history: &[Turn],
        _question: &str,
    ) -> Result<String> {
        Err(ChatdocsError::GenerationUnavailable(
            "stub: generation gateway down".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        "failing-generator-stub"
    }
}
