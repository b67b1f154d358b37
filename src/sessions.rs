//! Session lifecycle orchestration.
//!
//! The [`SessionManager`] ties the pipeline together: extraction → chunking
//! → index build + persist → store record, and per-session chat with lazy
//! hydration. It is the only component that touches the store, the index,
//! and the engine together, and it owns the concurrency rules:
//!
//! - at most one `chat` in flight per session (queued, never interleaved);
//! - hydration is single-flight: concurrent first access constructs one
//!   engine, with waiters observing the outcome;
//! - different sessions are fully independent.
//!
//! Each session's engine lives in a [`SessionSlot`] behind a `tokio`
//! mutex; holding the mutex while the slot is empty is the `Hydrating`
//! state, and the slot also records an observable [`Hydration`] value for
//! inspection without contending on the engine lock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::{self, EmbeddingClient};
use crate::engine::{ChatOutcome, ConversationEngine};
use crate::error::{ChatdocsError, Result};
use crate::extract::extract_text;
use crate::generation::{self, GenerationClient};
use crate::index::VectorIndex;
use crate::models::SessionRecord;
use crate::store::SessionStore;

/// One document handed to [`SessionManager::create_session`]: a file name
/// (used for format dispatch) and its raw bytes.
#[derive(Debug, Clone)]
pub struct IngestFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Observable hydration state of a session's conversation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hydration {
    /// Metadata loaded, no engine constructed.
    Cold,
    /// Index being loaded and engine being constructed.
    Hydrating,
    /// Engine cached in memory, ready to serve chat.
    Warm,
}

/// Holder for one session's lazily constructed engine.
///
/// The `engine` mutex serializes chat per session; while it is held with an
/// empty slot, the session is hydrating. A failed hydration leaves the slot
/// empty (back to `Cold`); a partially constructed engine is never cached.
struct SessionSlot {
    state: RwLock<Hydration>,
    engine: Mutex<Option<ConversationEngine>>,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            state: RwLock::new(Hydration::Cold),
            engine: Mutex::new(None),
        }
    }

    async fn set_state(&self, state: Hydration) {
        *self.state.write().await = state;
    }
}

/// Orchestrates session creation, lazy hydration, chat, listing, and
/// deletion over the shared session registry.
pub struct SessionManager {
    chunking: ChunkingConfig,
    top_k: usize,
    store: SessionStore,
    embedder: Arc<dyn EmbeddingClient>,
    generator: Arc<dyn GenerationClient>,
    slots: RwLock<HashMap<String, Arc<SessionSlot>>>,
}

impl SessionManager {
    /// Construct a manager with gateways built from configuration.
    ///
    /// Fails at boot for unknown providers or missing credentials.
    pub fn new(config: &Config) -> Result<Self> {
        let embedder = embedding::create_client(&config.embedding)?;
        let generator = generation::create_client(&config.generation)?;
        Self::with_clients(config, embedder, generator)
    }

    /// Construct a manager with caller-supplied gateway clients. Used by
    /// tests to inject deterministic stubs.
    pub fn with_clients(
        config: &Config,
        embedder: Arc<dyn EmbeddingClient>,
        generator: Arc<dyn GenerationClient>,
    ) -> Result<Self> {
        let store = SessionStore::open(config.storage.root.clone())?;

        Ok(Self {
            chunking: config.chunking.clone(),
            top_k: config.retrieval.top_k,
            store,
            embedder,
            generator,
            slots: RwLock::new(HashMap::new()),
        })
    }

    /// The underlying session store (read access for the HTTP layer and for
    /// durable-consistency assertions in tests).
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Create a session from a set of files.
    ///
    /// Extracts text from each file (skipping unreadable or unsupported
    /// ones with a warning), chunks the aggregate, builds and persists the
    /// vector index, then creates the store record, in that order, so a
    /// session only becomes visible once its index exists on disk.
    ///
    /// # Errors
    ///
    /// - [`ChatdocsError::EmptyContent`] if no files were supplied or no
    ///   text could be extracted from any of them.
    /// - [`ChatdocsError::EmbeddingUnavailable`] if the index build fails;
    ///   nothing is persisted in that case.
    pub async fn create_session(&self, files: Vec<IngestFile>) -> Result<SessionRecord> {
        if files.is_empty() {
            return Err(ChatdocsError::EmptyContent);
        }

        let mut document_names = Vec::new();
        let mut text = String::new();

        for file in &files {
            match extract_text(&file.name, &file.bytes) {
                Ok(extracted) => {
                    if !text.is_empty() {
                        text.push_str("\n\n");
                    }
                    text.push_str(&extracted);
                    document_names.push(file.name.clone());
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "skipping file during ingestion");
                }
            }
        }

        let chunks = chunk_text(&text, self.chunking.chunk_size, self.chunking.overlap)?;
        if chunks.is_empty() {
            return Err(ChatdocsError::EmptyContent);
        }

        let id = SessionStore::allocate_id();
        let dir = self.store.session_dir(&id);

        let index = VectorIndex::build(&chunks, self.embedder.as_ref()).await?;
        index.persist(&dir)?;

        match self.store.create_with_id(id.clone(), document_names).await {
            Ok(record) => {
                info!(session = %record.id, documents = record.document_names.len(),
                      chunks = index.len(), "session created");
                Ok(record)
            }
            Err(e) => {
                // The record never existed; don't leave an orphaned index.
                let _ = std::fs::remove_dir_all(&dir);
                Err(e)
            }
        }
    }

    /// Answer a question within a session, hydrating the engine on first use.
    ///
    /// # Errors
    ///
    /// - [`ChatdocsError::EmptyQuestion`] for an empty or whitespace question.
    /// - [`ChatdocsError::SessionNotFound`] if the session does not exist,
    ///   or its persisted state cannot be hydrated (missing or corrupt
    ///   index, malformed transcript); the session is unusable either way.
    /// - [`ChatdocsError::EmbeddingUnavailable`] /
    ///   [`ChatdocsError::GenerationUnavailable`] on upstream failure; the
    ///   transcript is left exactly as before the call.
    pub async fn chat(&self, id: &str, question: &str) -> Result<ChatOutcome> {
        if question.trim().is_empty() {
            return Err(ChatdocsError::EmptyQuestion);
        }

        let record = self.store.get(id).await?;
        let slot = self.slot(id).await;

        // Serializes chat per session; also the single-flight hydration guard.
        let mut engine_guard = slot.engine.lock().await;

        if engine_guard.is_none() {
            slot.set_state(Hydration::Hydrating).await;
            match self.hydrate(&record) {
                Ok(engine) => {
                    *engine_guard = Some(engine);
                    slot.set_state(Hydration::Warm).await;
                    info!(session = %id, "session hydrated");
                }
                Err(e) => {
                    slot.set_state(Hydration::Cold).await;
                    warn!(session = %id, error = %e, "hydration failed");
                    return Err(ChatdocsError::SessionNotFound(id.to_string()));
                }
            }
        }

        let Some(engine) = engine_guard.as_mut() else {
            return Err(ChatdocsError::SessionNotFound(id.to_string()));
        };

        let outcome = engine.ask(question).await?;

        // Durable write first; if it fails, the in-memory transcript must
        // not get ahead of the on-disk record.
        if let Err(e) = self.store.update(id, outcome.transcript.clone()).await {
            engine.rollback_last_exchange();
            return Err(e);
        }

        Ok(outcome)
    }

    /// Fetch a session's metadata.
    pub async fn get_session(&self, id: &str) -> Result<SessionRecord> {
        self.store.get(id).await
    }

    /// All sessions, most recently active first.
    pub async fn list_sessions(&self) -> Vec<SessionRecord> {
        self.store.list().await
    }

    /// Delete a session: drop any engine, remove the store record, and
    /// remove the session directory (index included). Both removals are
    /// attempted even if one fails; the operation succeeds if the net
    /// effect is "session no longer exists". Idempotent.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        self.slots.write().await.remove(id);

        purge_session(&self.store, id).await?;

        info!(session = %id, "session deleted");
        Ok(())
    }

    /// Observable hydration state for `id`. Sessions without a slot (never
    /// chatted since startup) are `Cold`.
    pub async fn hydration(&self, id: &str) -> Hydration {
        let slots = self.slots.read().await;
        match slots.get(id) {
            Some(slot) => *slot.state.read().await,
            None => Hydration::Cold,
        }
    }

    async fn slot(&self, id: &str) -> Arc<SessionSlot> {
        let mut slots = self.slots.write().await;
        slots
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(SessionSlot::new()))
            .clone()
    }

    /// Load the persisted index and reconstruct the engine seeded with the
    /// stored transcript. Runs while the caller holds the slot's engine
    /// mutex, making first-access hydration single-flight.
    fn hydrate(&self, record: &SessionRecord) -> Result<ConversationEngine> {
        let dir = self.store.session_dir(&record.id);
        let index = VectorIndex::load(&dir)?;

        ConversationEngine::new(
            index,
            record.transcript.clone(),
            self.top_k,
            self.embedder.clone(),
            self.generator.clone(),
        )
    }
}

/// Remove a session's durable state: the store record and the session
/// directory, index included. Both removals are attempted even if one
/// fails; succeeds when the net effect is "session no longer exists".
pub async fn purge_session(store: &SessionStore, id: &str) -> Result<()> {
    let store_result = store.delete(id).await;

    let dir = store.session_dir(id);
    let fs_result = match std::fs::remove_dir_all(&dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ChatdocsError::from(e)),
    };

    store_result?;
    fs_result?;
    Ok(())
}
