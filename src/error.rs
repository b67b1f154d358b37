//! Error taxonomy for chatdocs.
//!
//! Every boundary operation (session creation, chat, store access, index
//! load) returns one of these kinds, so callers such as the HTTP layer can
//! classify failures without inspecting message strings.

use std::path::PathBuf;

use thiserror::Error;

/// Closed set of failure kinds surfaced by chatdocs operations.
#[derive(Error, Debug)]
pub enum ChatdocsError {
    /// Configuration is structurally invalid (e.g. chunk overlap >= size).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No text could be extracted from any of the supplied files.
    #[error("no text could be extracted from the supplied files")]
    EmptyContent,

    /// The question text was empty or whitespace-only.
    #[error("question must not be empty")]
    EmptyQuestion,

    /// The session does not exist in memory or on disk, or is unusable.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The embedding gateway could not be reached or rejected the request.
    #[error("embedding gateway unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The generation gateway could not be reached or rejected the request.
    #[error("generation gateway unavailable: {0}")]
    GenerationUnavailable(String),

    /// No persisted index exists at the expected location.
    #[error("no index found at {}", .0.display())]
    IndexNotFound(PathBuf),

    /// A persisted index exists but cannot be parsed or is inconsistent.
    #[error("index at {} is corrupt: {reason}", .path.display())]
    IndexCorrupt { path: PathBuf, reason: String },

    /// A stored transcript is not a well-formed sequence of user/assistant pairs.
    #[error("stored transcript is corrupt: {0}")]
    CorruptTranscript(String),

    /// Durable storage failed (unreadable record, failed write).
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O failure while touching durable storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure while reading or writing a durable record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChatdocsError>;
