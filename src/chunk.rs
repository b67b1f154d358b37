//! Overlapping word-window text chunker.
//!
//! Splits extracted document text into [`Chunk`]s of at most `chunk_size`
//! words, each window starting `chunk_size - overlap` words after the
//! previous one, so consecutive chunks share their trailing/leading `overlap`
//! words. Purely functional and deterministic: the same input always
//! produces the same chunk sequence.
//!
//! Each chunk carries its position in the sequence and a SHA-256 hash of its
//! text, which travels with the chunk into the persisted index.

use sha2::{Digest, Sha256};

use crate::error::{ChatdocsError, Result};

/// A contiguous span of source text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Position within the chunk sequence, starting at 0.
    pub index: usize,
    /// The chunk text (words re-joined with single spaces).
    pub text: String,
    /// SHA-256 of the chunk text, hex-encoded.
    pub hash: String,
}

/// Split `text` into overlapping word windows.
///
/// Words are whitespace-separated tokens; each chunk is at most `chunk_size`
/// words and starts `chunk_size - overlap` words after the previous chunk.
/// Empty (or whitespace-only) input yields zero chunks.
///
/// # Errors
///
/// Returns [`ChatdocsError::InvalidConfiguration`] if `overlap >= chunk_size`
/// or `chunk_size` is zero.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(ChatdocsError::InvalidConfiguration(
            "chunk_size must be > 0".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(ChatdocsError::InvalidConfiguration(format!(
            "overlap ({}) must be < chunk_size ({})",
            overlap, chunk_size
        )));
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Ok(Vec::new());
    }

    let stride = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        chunks.push(make_chunk(chunks.len(), words[start..end].join(" ")));
        start += stride;
    }

    Ok(chunks)
}

fn make_chunk(index: usize, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk { index, text, hash }
}
