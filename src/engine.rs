//! Per-session conversation engine.
//!
//! A [`ConversationEngine`] owns one logical transcript and drives the
//! retrieve → prompt → generate loop for one session: embed the question,
//! pull the top-k chunks from the session's [`VectorIndex`], hand context +
//! prior turns + question to the generation gateway, then append the matched
//! user/assistant turn pair.
//!
//! The append is all-or-nothing: a gateway failure leaves the transcript
//! exactly as it was. One engine instance serves one caller at a time; the
//! lifecycle manager serializes access per session.

use std::sync::Arc;

use crate::embedding::EmbeddingClient;
use crate::error::{ChatdocsError, Result};
use crate::generation::GenerationClient;
use crate::index::VectorIndex;
use crate::models::{transcript_is_well_formed, Turn};

/// Result of a successful `ask`: the answer and the full updated transcript.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub answer: String,
    pub transcript: Vec<Turn>,
}

/// Stateful retrieval + conversation loop for one session.
pub struct ConversationEngine {
    index: VectorIndex,
    transcript: Vec<Turn>,
    top_k: usize,
    embedder: Arc<dyn EmbeddingClient>,
    generator: Arc<dyn GenerationClient>,
}

impl std::fmt::Debug for ConversationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationEngine")
            .field("transcript", &self.transcript)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl ConversationEngine {
    /// Construct an engine seeded with a stored transcript.
    ///
    /// # Errors
    ///
    /// Returns [`ChatdocsError::CorruptTranscript`] if the stored transcript
    /// is not a sequence of alternating user/assistant pairs, which means
    /// the durable record was truncated or edited out-of-band.
    pub fn new(
        index: VectorIndex,
        transcript: Vec<Turn>,
        top_k: usize,
        embedder: Arc<dyn EmbeddingClient>,
        generator: Arc<dyn GenerationClient>,
    ) -> Result<Self> {
        if !transcript_is_well_formed(&transcript) {
            return Err(ChatdocsError::CorruptTranscript(format!(
                "{} turns, not alternating user/assistant pairs",
                transcript.len()
            )));
        }

        Ok(Self {
            index,
            transcript,
            top_k,
            embedder,
            generator,
        })
    }

    /// The engine's current transcript.
    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Answer `question` from the session's documents.
    ///
    /// On success the user question and the generated answer are appended to
    /// the transcript, in that order. On any gateway failure the transcript
    /// is untouched.
    pub async fn ask(&mut self, question: &str) -> Result<ChatOutcome> {
        let query_vec = self.embedder.embed_query(question).await?;
        let retrieved = self.index.search(&query_vec, self.top_k);
        let context = retrieved.join("\n");

        let answer = self
            .generator
            .generate(&context, &self.transcript, question)
            .await?;

        self.transcript.push(Turn::user(question));
        self.transcript.push(Turn::assistant(answer.clone()));

        Ok(ChatOutcome {
            answer,
            transcript: self.transcript.clone(),
        })
    }

    /// Drop the last user/assistant pair.
    ///
    /// Used by the lifecycle manager when the durable transcript write fails
    /// after a successful generation, so the in-memory transcript never gets
    /// ahead of the on-disk record.
    pub fn rollback_last_exchange(&mut self) {
        self.transcript.truncate(self.transcript.len().saturating_sub(2));
    }
}
