//! Per-user question/answer history
//!
//! Mirrors the history semantics of the backend the assistant talks to:
//! records are keyed by a username string, listed newest-first, and cleared
//! per user. The document store itself stays an external collaborator; this
//! is the in-process view of it.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One recorded question/response exchange
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub username: String,
    pub question: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(
        username: impl Into<String>,
        question: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            question: question.into(),
            response: response.into(),
            created_at: Utc::now(),
        }
    }
}

/// Thread-safe, username-keyed history of exchanges
#[derive(Clone, Default)]
pub struct HistoryStore {
    records: Arc<RwLock<Vec<HistoryRecord>>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed exchange
    pub fn record(&self, username: &str, question: &str, response: &str) {
        self.records
            .write()
            .push(HistoryRecord::new(username, question, response));
    }

    /// All records for a user, newest first
    pub fn list_for(&self, username: &str) -> Vec<HistoryRecord> {
        self.records
            .read()
            .iter()
            .rev()
            .filter(|r| r.username == username)
            .cloned()
            .collect()
    }

    /// Delete all records for a user. Returns how many were removed.
    pub fn clear_user(&self, username: &str) -> usize {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| r.username != username);
        before - records.len()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
