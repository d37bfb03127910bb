pub mod history;
pub mod store;
pub mod types;

pub use history::{HistoryRecord, HistoryStore};
pub use store::{JsonFileBackend, MemoryBackend, SessionBackend, SessionStore};
pub use types::{Mode, Session, SessionId};
