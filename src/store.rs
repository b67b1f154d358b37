//! Authoritative session registry with a durable on-disk mirror.
//!
//! The [`SessionStore`] owns all session metadata mutation. Each session
//! lives in its own directory under the storage root, holding a
//! `session.json` metadata record (and, written by the index layer, the
//! serialized vector index). An in-memory cache fronts the durable records;
//! every mutation writes durably before touching the cache, so a crash
//! between the two never leaves disk behind memory.
//!
//! On startup the storage root is scanned and every valid record is loaded
//! into the cache; malformed records are skipped with a logged warning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::error::{ChatdocsError, Result};
use crate::models::{SessionRecord, Turn};

/// File name of the metadata record within a session directory.
pub const SESSION_FILE: &str = "session.json";

/// Registry of session metadata, cache over one-directory-per-session
/// durable records.
pub struct SessionStore {
    root: PathBuf,
    cache: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionStore {
    /// Open the store rooted at `root`, creating the directory if needed and
    /// reconciling the cache from whatever durable records already exist.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let cache = reconcile(&root)?;

        Ok(Self {
            root,
            cache: RwLock::new(cache),
        })
    }

    /// Allocate a fresh session identifier.
    ///
    /// Exposed separately from [`create_with_id`](Self::create_with_id) so
    /// the lifecycle manager can persist the session's index under this id
    /// *before* the record exists: a session only becomes visible once its
    /// index is durable.
    pub fn allocate_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Directory holding the durable state for `id`.
    pub fn session_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Create a session record with a caller-allocated id and an empty
    /// transcript, durably then in cache.
    pub async fn create_with_id(
        &self,
        id: String,
        document_names: Vec<String>,
    ) -> Result<SessionRecord> {
        let record = SessionRecord {
            id,
            document_names,
            transcript: Vec::new(),
            updated_at: Utc::now(),
        };

        let mut cache = self.cache.write().await;
        self.write_record(&record)?;
        cache.insert(record.id.clone(), record.clone());

        Ok(record)
    }

    /// Create a session record, allocating a fresh identifier.
    pub async fn create(&self, document_names: Vec<String>) -> Result<SessionRecord> {
        self.create_with_id(Self::allocate_id(), document_names).await
    }

    /// Fetch a session's metadata, reading through to disk on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns [`ChatdocsError::SessionNotFound`] if the session is absent
    /// from both the cache and durable storage.
    pub async fn get(&self, id: &str) -> Result<SessionRecord> {
        if let Some(record) = self.cache.read().await.get(id) {
            return Ok(record.clone());
        }

        // Cache miss: the record may have been written by a previous process
        // life. Load it and warm the cache.
        let record = self.load_record(id)?;
        self.cache
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    /// Overwrite a session's transcript and refresh its activity timestamp,
    /// durably first.
    pub async fn update(&self, id: &str, transcript: Vec<Turn>) -> Result<SessionRecord> {
        let mut cache = self.cache.write().await;

        let mut record = match cache.get(id) {
            Some(record) => record.clone(),
            None => self.load_record(id)?,
        };
        record.transcript = transcript;
        record.updated_at = Utc::now();

        self.write_record(&record)?;
        cache.insert(record.id.clone(), record.clone());

        Ok(record)
    }

    /// All sessions ordered by activity timestamp descending; ties break by
    /// identifier descending.
    pub async fn list(&self) -> Vec<SessionRecord> {
        let cache = self.cache.read().await;
        let mut sessions: Vec<SessionRecord> = cache.values().cloned().collect();
        sessions.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        sessions
    }

    /// Remove the session's record from cache and disk. Idempotent: deleting
    /// a session that does not exist is not an error.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut cache = self.cache.write().await;
        cache.remove(id);

        match std::fs::remove_file(self.session_dir(id).join(SESSION_FILE)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a session record straight from durable storage, bypassing the
    /// cache. The reconstruction path used after restart, and by tests
    /// asserting durable/in-memory consistency.
    pub fn load_record(&self, id: &str) -> Result<SessionRecord> {
        let path = self.session_dir(id).join(SESSION_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ChatdocsError::SessionNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let record: SessionRecord = serde_json::from_str(&content)
            .map_err(|e| ChatdocsError::Storage(format!("malformed record {}: {}", id, e)))?;

        if record.id != id {
            return Err(ChatdocsError::Storage(format!(
                "record in {} claims id {}",
                id, record.id
            )));
        }

        Ok(record)
    }

    /// Write `record` to its `session.json`, atomically (temp file + rename).
    fn write_record(&self, record: &SessionRecord) -> Result<()> {
        let dir = self.session_dir(&record.id);
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(SESSION_FILE);
        let tmp = dir.join(format!("{}.tmp", SESSION_FILE));
        let json = serde_json::to_string_pretty(record)?;

        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;

        Ok(())
    }
}

/// Scan the storage root and load every valid session record. Malformed
/// records are skipped with a warning, never a fatal error.
fn reconcile(root: &Path) -> Result<HashMap<String, SessionRecord>> {
    let mut cache = HashMap::new();

    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let id = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path().join(SESSION_FILE);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(session = %id, error = %e, "skipping session directory without readable record");
                continue;
            }
        };

        match serde_json::from_str::<SessionRecord>(&content) {
            Ok(record) if record.id == id => {
                cache.insert(id, record);
            }
            Ok(record) => {
                warn!(session = %id, claimed = %record.id, "skipping record with mismatched id");
            }
            Err(e) => {
                warn!(session = %id, error = %e, "skipping malformed session record");
            }
        }
    }

    Ok(cache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Turn;

    fn open_store(tmp: &tempfile::TempDir) -> SessionStore {
        SessionStore::open(tmp.path()).unwrap()
    }

    #[tokio::test]
    async fn create_then_get_returns_names_in_upload_order() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);

        let names = vec!["b.pdf".to_string(), "a.pdf".to_string(), "a.pdf".to_string()];
        let record = store.create(names.clone()).await.unwrap();
        assert!(record.transcript.is_empty());

        let fetched = store.get(&record.id).await.unwrap();
        assert_eq!(fetched.document_names, names);
    }

    #[tokio::test]
    async fn get_unknown_session_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, ChatdocsError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn update_persists_durably_before_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);

        let record = store.create(vec!["doc.txt".to_string()]).await.unwrap();
        let transcript = vec![Turn::user("q"), Turn::assistant("a")];
        store.update(&record.id, transcript.clone()).await.unwrap();

        // The durable record, read bypassing the cache, matches.
        let durable = store.load_record(&record.id).unwrap();
        assert_eq!(durable.transcript, transcript);
        let cached = store.get(&record.id).await.unwrap();
        assert_eq!(cached, durable);
    }

    #[tokio::test]
    async fn update_refreshes_activity_timestamp() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);

        let record = store.create(vec!["doc.txt".to_string()]).await.unwrap();
        let updated = store
            .update(&record.id, vec![Turn::user("q"), Turn::assistant("a")])
            .await
            .unwrap();
        assert!(updated.updated_at >= record.updated_at);
    }

    #[tokio::test]
    async fn list_orders_by_recency_then_id_descending() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);

        let first = store.create(vec!["one.txt".to_string()]).await.unwrap();
        let second = store.create(vec!["two.txt".to_string()]).await.unwrap();
        let third = store.create(vec!["three.txt".to_string()]).await.unwrap();

        // Touch the first session so it becomes the most recent.
        store
            .update(&first.id, vec![Turn::user("q"), Turn::assistant("a")])
            .await
            .unwrap();

        let listed = store.list().await;
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].id, first.id);
        for pair in listed.windows(2) {
            assert!(
                pair[0].updated_at > pair[1].updated_at
                    || (pair[0].updated_at == pair[1].updated_at && pair[0].id > pair[1].id)
            );
        }
        let rest: Vec<&str> = listed[1..].iter().map(|r| r.id.as_str()).collect();
        assert!(rest.contains(&second.id.as_str()));
        assert!(rest.contains(&third.id.as_str()));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = open_store(&tmp);

        let record = store.create(vec!["doc.txt".to_string()]).await.unwrap();
        store.delete(&record.id).await.unwrap();
        assert!(matches!(
            store.get(&record.id).await.unwrap_err(),
            ChatdocsError::SessionNotFound(_)
        ));

        // Second delete and deleting an unknown id are fine.
        store.delete(&record.id).await.unwrap();
        store.delete("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn reopen_reconciles_valid_records_and_skips_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        let id = {
            let store = open_store(&tmp);
            let record = store.create(vec!["doc.txt".to_string()]).await.unwrap();
            store
                .update(&record.id, vec![Turn::user("q"), Turn::assistant("a")])
                .await
                .unwrap();
            record.id
        };

        // One malformed session directory alongside the valid one.
        let bad_dir = tmp.path().join("bad-session");
        std::fs::create_dir_all(&bad_dir).unwrap();
        std::fs::write(bad_dir.join(SESSION_FILE), "{ truncated").unwrap();

        let reopened = open_store(&tmp);
        let listed = reopened.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].transcript.len(), 2);
    }
}
