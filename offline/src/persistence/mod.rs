mod json_store;
pub mod sqlite;
pub mod traits;

pub(crate) use json_store::{JsonStore, Storable};

pub use sqlite::{Database, SqliteQuestionRepository, SqliteTestSessionRepository, StoreStats};
pub use traits::{QuestionRepository, TestSessionRepository};

use exam_model::{Attempt, ModelError, Question, TestSession};
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Corrupt row: {0}")]
    Model(#[from] ModelError),
    #[error("No {table} row for {key}")]
    MissingRow { table: &'static str, key: String },
    #[error("Session {0} can only be completed through finalize")]
    CompleteWithoutFinalize(String),
}

/// A session together with its attempts and the questions they reference.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionBundle {
    pub session: TestSession,
    /// Sorted by `attempt_order`.
    pub attempts: Vec<Attempt>,
    pub questions: Vec<Question>,
}

/// Get the current unix timestamp in seconds.
pub fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
