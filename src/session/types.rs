use crate::markdown::Block;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Assistant request mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Find bugs, explain, suggest improvements and provide a fixed version
    #[default]
    Debug,
    /// Produce code from a description (or an attached image)
    Generate,
    /// Narrate the code line by line
    Explain,
}

impl Mode {
    /// Capitalized label for session titles
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Debug => "Debug",
            Mode::Generate => "Generate",
            Mode::Explain => "Explain",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Debug => write!(f, "debug"),
            Mode::Generate => write!(f, "generate"),
            Mode::Explain => write!(f, "explain"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = crate::CodevoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(Mode::Debug),
            "generate" => Ok(Mode::Generate),
            "explain" => Ok(Mode::Explain),
            other => Err(crate::CodevoiceError::Config(format!(
                "unknown mode: {other}"
            ))),
        }
    }
}

/// Last identifier handed out; new ids are max(clock, last + 1)
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Opaque session identifier.
///
/// Generated from a monotonically increasing millisecond clock reading, so
/// ids are unique within a single process lifetime even when two sessions are
/// created within the same millisecond.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate the next identifier
    pub fn next() -> Self {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let prev = NEXT_ID
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|v| v);
        SessionId(now.max(prev + 1))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One persisted prompt/response exchange.
///
/// Created on successful completion of a request; immutable once stored
/// except for deletion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub input_text: String,
    pub mode: Mode,
    pub blocks: Vec<Block>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session with a fresh id and timestamp
    pub fn new(
        title: impl Into<String>,
        input_text: impl Into<String>,
        mode: Mode,
        blocks: Vec<Block>,
    ) -> Self {
        Self {
            id: SessionId::next(),
            title: title.into(),
            input_text: input_text.into(),
            mode,
            blocks,
            created_at: Utc::now(),
        }
    }

    /// Default title for the n-th session of a mode, e.g. "Debug Session 3"
    pub fn default_title(mode: Mode, index: usize) -> String {
        format!("{} Session {}", mode.label(), index)
    }
}
