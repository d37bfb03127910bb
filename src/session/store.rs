//! Client-side session persistence
//!
//! The store keeps the authoritative, insertion-ordered session list in
//! memory and mirrors every mutation to a pluggable backend. Backends only
//! support whole-collection replacement (the original persistence mechanism
//! had no partial updates), so deletion is delete-then-rewrite-remaining;
//! callers never observe the difference because reads are served from memory.

use super::types::{Session, SessionId};
use crate::{CodevoiceError, Result};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Persistence collaborator for the session store.
///
/// Semantics are a document collection addressed as a whole: load everything,
/// replace everything.
pub trait SessionBackend: Send + Sync {
    /// Load all persisted sessions in insertion order
    fn load(&self) -> Result<Vec<Session>>;

    /// Replace the persisted collection with the given sessions
    fn replace_all(&self, sessions: &[Session]) -> Result<()>;
}

/// In-memory backend for tests and ephemeral use
#[derive(Default)]
pub struct MemoryBackend {
    sessions: Mutex<Vec<Session>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionBackend for MemoryBackend {
    fn load(&self) -> Result<Vec<Session>> {
        Ok(self.sessions.lock().clone())
    }

    fn replace_all(&self, sessions: &[Session]) -> Result<()> {
        *self.sessions.lock() = sessions.to_vec();
        Ok(())
    }
}

/// File-backed backend storing the whole collection as one JSON document
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionBackend for JsonFileBackend {
    fn load(&self) -> Result<Vec<Session>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw)
            .map_err(|e| CodevoiceError::Persistence(format!("corrupt session file: {e}")))
    }

    fn replace_all(&self, sessions: &[Session]) -> Result<()> {
        let raw = serde_json::to_string_pretty(sessions)
            .map_err(|e| CodevoiceError::Persistence(e.to_string()))?;

        // Write to a sibling temp file and rename so a crash mid-write never
        // leaves a truncated collection behind.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Insertion-ordered list of named sessions, mirrored to a backend
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<Vec<Session>>>,
    backend: Arc<dyn SessionBackend>,
}

impl SessionStore {
    /// Create a store over the given backend, loading any persisted sessions.
    ///
    /// A backend that fails to load is logged and the store starts empty
    /// rather than failing the caller.
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        let sessions = match backend.load() {
            Ok(sessions) => {
                debug!("Loaded {} persisted sessions", sessions.len());
                sessions
            }
            Err(e) => {
                warn!("Failed to load sessions, starting empty: {}", e);
                Vec::new()
            }
        };

        Self {
            sessions: Arc::new(RwLock::new(sessions)),
            backend,
        }
    }

    /// Create a store with no persistence beyond process memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Append a session
    pub fn save(&self, session: Session) {
        let mut sessions = self.sessions.write();
        sessions.push(session);
        self.persist(&sessions);
    }

    /// All sessions in insertion order
    pub fn list(&self) -> Vec<Session> {
        self.sessions.read().clone()
    }

    /// Look up a session by id
    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.sessions.read().iter().find(|s| s.id == id).cloned()
    }

    /// Delete one session. Returns true if it existed.
    pub fn delete(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        let removed = sessions.len() != before;
        if removed {
            self.persist(&sessions);
        }
        removed
    }

    /// Remove all sessions unconditionally. Irreversible.
    pub fn clear(&self) {
        let mut sessions = self.sessions.write();
        sessions.clear();
        self.persist(&sessions);
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Mirror the in-memory list to the backend. A failing backend is logged
    /// and the in-memory state stays authoritative.
    fn persist(&self, sessions: &[Session]) {
        if let Err(e) = self.backend.replace_all(sessions) {
            warn!("Failed to persist sessions: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::Block;
    use crate::session::types::Mode;

    fn session(title: &str) -> Session {
        Session::new(title, "input", Mode::Debug, vec![Block::text("ok")])
    }

    #[test]
    fn test_save_then_list_in_insertion_order() {
        let store = SessionStore::in_memory();

        store.save(session("first"));
        store.save(session("second"));
        store.save(session("third"));

        let titles: Vec<String> = store.list().into_iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_delete_removes_only_that_id() {
        let store = SessionStore::in_memory();

        let victim = session("victim");
        let victim_id = victim.id;
        store.save(session("keep"));
        store.save(victim);

        assert!(store.delete(victim_id));
        assert!(!store.delete(victim_id));

        let listed = store.list();
        assert_eq!(listed.len(), 1);
        assert!(listed.iter().all(|s| s.id != victim_id));
    }

    #[test]
    fn test_clear_empties_store() {
        let store = SessionStore::in_memory();
        store.save(session("a"));
        store.save(session("b"));

        store.clear();

        assert!(store.list().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_json_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        {
            let store = SessionStore::new(Arc::new(JsonFileBackend::new(&path)));
            store.save(session("persisted"));
        }

        let reloaded = SessionStore::new(Arc::new(JsonFileBackend::new(&path)));
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.list()[0].title, "persisted");
    }

    #[test]
    fn test_delete_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let store = SessionStore::new(Arc::new(JsonFileBackend::new(&path)));
        let doomed = session("doomed");
        let doomed_id = doomed.id;
        store.save(doomed);
        store.save(session("kept"));
        store.delete(doomed_id);

        let reloaded = SessionStore::new(Arc::new(JsonFileBackend::new(&path)));
        let listed = reloaded.list();
        assert_eq!(listed.len(), 1);
        assert!(listed.iter().all(|s| s.id != doomed_id));
    }

    #[test]
    fn test_corrupt_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "not json at all").unwrap();

        let store = SessionStore::new(Arc::new(JsonFileBackend::new(&path)));
        assert!(store.is_empty());
    }
}
