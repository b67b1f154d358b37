//! Per-session vector index.
//!
//! A [`VectorIndex`] is an immutable structure over the embedded chunks of
//! exactly one session, built in full at session creation. It is never
//! patched: a new document set means a new session with a new index.
//!
//! The index is serialized as pretty-printed JSON (`index.json`) inside the
//! session's directory and can be reloaded without the original documents.
//! Writes go through a temp file + rename so a concurrent reader observes
//! either the old or the new index, never a truncated one.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::embedding::{cosine_similarity, EmbeddingClient};
use crate::error::{ChatdocsError, Result};

/// File name of the serialized index within a session directory.
pub const INDEX_FILE: &str = "index.json";

/// An embedded chunk as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IndexedChunk {
    index: usize,
    text: String,
    hash: String,
    vector: Vec<f32>,
}

/// Nearest-neighbor index over one session's embedded chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    /// Embedding model the vectors were produced with.
    model: String,
    chunks: Vec<IndexedChunk>,
}

impl VectorIndex {
    /// Build an index by embedding every chunk through the gateway.
    ///
    /// All-or-nothing: if the gateway fails, no index is constructed and
    /// nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns [`ChatdocsError::EmbeddingUnavailable`] if the gateway call
    /// fails or returns the wrong number of vectors.
    pub async fn build(chunks: &[Chunk], embedder: &dyn EmbeddingClient) -> Result<Self> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(ChatdocsError::EmbeddingUnavailable(format!(
                "expected {} vectors, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let chunks = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedChunk {
                index: chunk.index,
                text: chunk.text.clone(),
                hash: chunk.hash.clone(),
                vector,
            })
            .collect();

        Ok(Self {
            model: embedder.model_name().to_string(),
            chunks,
        })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Return the texts of the ≤ `k` chunks most similar to `query_vec`,
    /// ranked by descending cosine similarity; ties break toward the chunk
    /// that appeared first in the source.
    pub fn search(&self, query_vec: &[f32], k: usize) -> Vec<&str> {
        let mut scored: Vec<(f32, usize)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(pos, c)| (cosine_similarity(query_vec, &c.vector), pos))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        scored
            .into_iter()
            .take(k)
            .map(|(_, pos)| self.chunks[pos].text.as_str())
            .collect()
    }

    /// Serialize the index into `dir/index.json` atomically.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let path = dir.join(INDEX_FILE);
        let tmp = dir.join(format!("{}.tmp", INDEX_FILE));
        let json = serde_json::to_string_pretty(self)?;

        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;

        Ok(())
    }

    /// Load a previously persisted index from `dir`.
    ///
    /// # Errors
    ///
    /// - [`ChatdocsError::IndexNotFound`] if `dir/index.json` does not exist.
    /// - [`ChatdocsError::IndexCorrupt`] if it exists but cannot be parsed,
    ///   or its vectors disagree on dimensionality.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(INDEX_FILE);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ChatdocsError::IndexNotFound(path));
            }
            Err(e) => return Err(e.into()),
        };

        let index: VectorIndex =
            serde_json::from_str(&content).map_err(|e| ChatdocsError::IndexCorrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        index.validate(&path)?;

        Ok(index)
    }

    /// Reject indices whose vectors disagree on dimensionality.
    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(first) = self.chunks.first() {
            let dims = first.vector.len();
            if dims == 0 {
                return Err(ChatdocsError::IndexCorrupt {
                    path: path.to_path_buf(),
                    reason: "zero-dimensional embedding vectors".to_string(),
                });
            }
            if let Some(bad) = self.chunks.iter().find(|c| c.vector.len() != dims) {
                return Err(ChatdocsError::IndexCorrupt {
                    path: path.to_path_buf(),
                    reason: format!(
                        "chunk {} has {} dims, expected {}",
                        bad.index,
                        bad.vector.len(),
                        dims
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Deterministic stub: each text maps to a fixed vector by lookup.
    struct TableEmbedder {
        table: Vec<(&'static str, Vec<f32>)>,
    }

    #[async_trait]
    impl EmbeddingClient for TableEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            texts
                .iter()
                .map(|t| {
                    self.table
                        .iter()
                        .find(|(k, _)| *k == t.as_str())
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| {
                            ChatdocsError::EmbeddingUnavailable(format!("unknown text: {}", t))
                        })
                })
                .collect()
        }

        fn model_name(&self) -> &str {
            "table-stub"
        }
    }

    /// Stub that always fails, for the no-partial-index contract.
    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingClient for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(ChatdocsError::EmbeddingUnavailable("quota".to_string()))
        }

        fn model_name(&self) -> &str {
            "failing-stub"
        }
    }

    fn fixed_chunks() -> Vec<Chunk> {
        vec![
            Chunk {
                index: 0,
                text: "paris".to_string(),
                hash: "h0".to_string(),
            },
            Chunk {
                index: 1,
                text: "tokyo".to_string(),
                hash: "h1".to_string(),
            },
            Chunk {
                index: 2,
                text: "berlin".to_string(),
                hash: "h2".to_string(),
            },
        ]
    }

    fn table() -> TableEmbedder {
        TableEmbedder {
            table: vec![
                ("paris", vec![1.0, 0.0, 0.0]),
                ("tokyo", vec![0.0, 1.0, 0.0]),
                ("berlin", vec![0.0, 0.0, 1.0]),
            ],
        }
    }

    #[tokio::test]
    async fn build_then_search_ranks_by_similarity() {
        let index = VectorIndex::build(&fixed_chunks(), &table()).await.unwrap();
        assert_eq!(index.len(), 3);

        let results = index.search(&[0.9, 0.1, 0.0], 2);
        assert_eq!(results, vec!["paris", "tokyo"]);
    }

    #[tokio::test]
    async fn search_returns_at_most_k() {
        let index = VectorIndex::build(&fixed_chunks(), &table()).await.unwrap();
        assert_eq!(index.search(&[1.0, 0.0, 0.0], 10).len(), 3);
        assert_eq!(index.search(&[1.0, 0.0, 0.0], 1).len(), 1);
    }

    #[tokio::test]
    async fn ties_break_toward_earlier_chunks() {
        // Query equidistant from all three chunks.
        let index = VectorIndex::build(&fixed_chunks(), &table()).await.unwrap();
        let results = index.search(&[1.0, 1.0, 1.0], 3);
        assert_eq!(results, vec!["paris", "tokyo", "berlin"]);
    }

    #[tokio::test]
    async fn failed_embedding_builds_nothing() {
        let err = VectorIndex::build(&fixed_chunks(), &FailingEmbedder)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatdocsError::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn persist_load_round_trip_is_search_equivalent() {
        let tmp = tempfile::tempdir().unwrap();
        let index = VectorIndex::build(&fixed_chunks(), &table()).await.unwrap();
        index.persist(tmp.path()).unwrap();

        let loaded = VectorIndex::load(tmp.path()).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(
            loaded.search(&[0.9, 0.1, 0.0], 2),
            index.search(&[0.9, 0.1, 0.0], 2)
        );
    }

    #[test]
    fn load_missing_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = VectorIndex::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ChatdocsError::IndexNotFound(_)));
    }

    #[test]
    fn load_unparseable_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(INDEX_FILE), "{ not json").unwrap();
        let err = VectorIndex::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ChatdocsError::IndexCorrupt { .. }));
    }

    #[test]
    fn load_mismatched_dims_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let json = serde_json::json!({
            "model": "m",
            "chunks": [
                {"index": 0, "text": "a", "hash": "h", "vector": [1.0, 0.0]},
                {"index": 1, "text": "b", "hash": "h", "vector": [1.0]}
            ]
        });
        std::fs::write(tmp.path().join(INDEX_FILE), json.to_string()).unwrap();
        let err = VectorIndex::load(tmp.path()).unwrap_err();
        assert!(matches!(err, ChatdocsError::IndexCorrupt { .. }));
    }

    #[tokio::test]
    async fn empty_chunk_set_builds_empty_index() {
        let index = VectorIndex::build(&[], &table()).await.unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[1.0], 4).is_empty());
    }
}
