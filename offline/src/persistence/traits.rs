//! Async repository trait definitions for the persistence layer.
//!
//! Methods return `impl Future + Send` rather than using `async fn` so that
//! the futures are guaranteed `Send`, which lets services holding a
//! repository be driven from `tokio::spawn`.
//!
//! "Not found" is always an absent value (`Ok(None)` or an empty `Vec`),
//! never an error. Errors are reserved for genuine inconsistencies: a failed
//! transaction, a corrupt row, or an update aimed at a row that must exist.

use super::{PersistenceError, SessionBundle};
use exam_model::{Attempt, Question, QuestionSyncMetadata, SessionStatus, TestSession};
use std::future::Future;

/// Repository for the locally cached question bank.
pub trait QuestionRepository: Send + Sync {
    fn questions_by_subject(
        &self,
        subject: &str,
    ) -> impl Future<Output = Result<Vec<Question>, PersistenceError>> + Send;

    fn questions_by_topic(
        &self,
        subject: &str,
        topic: &str,
    ) -> impl Future<Output = Result<Vec<Question>, PersistenceError>> + Send;

    fn all_questions(&self) -> impl Future<Output = Result<Vec<Question>, PersistenceError>> + Send;

    /// Questions whose id is any of `ids`. Unknown ids are skipped.
    fn questions_by_ids(
        &self,
        ids: &[String],
    ) -> impl Future<Output = Result<Vec<Question>, PersistenceError>> + Send;

    fn sync_metadata(
        &self,
        subject: &str,
    ) -> impl Future<Output = Result<Option<QuestionSyncMetadata>, PersistenceError>> + Send;

    /// Insert or replace by id. Empty input is a no-op.
    fn bulk_upsert(
        &self,
        questions: &[Question],
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// With `last_fetched_at`: upsert the full record. Without: bump
    /// `last_sync` on an existing record, failing with
    /// [`PersistenceError::MissingRow`] if there is none.
    fn update_sync_metadata(
        &self,
        subject: &str,
        last_fetched_at: Option<u64>,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

/// Repository for the active test session and its attempts.
///
/// Implementations must write `initialize` and `finalize` atomically: either
/// every row lands or none does.
pub trait TestSessionRepository: Send + Sync {
    fn initialize(
        &self,
        session: &TestSession,
        attempts: &[Attempt],
        questions: &[Question],
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    fn load_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Option<SessionBundle>, PersistenceError>> + Send;

    /// Sessions in `created`, `ongoing` or `paused`. By convention at most one.
    fn ongoing_sessions(
        &self,
    ) -> impl Future<Output = Result<Vec<TestSession>, PersistenceError>> + Send;

    /// Upsert by `(session_id, question_id)`.
    fn save_attempt(
        &self,
        attempt: &Attempt,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Partial update. Returns `None` (and writes nothing) if the session
    /// does not exist or is already completed. Marks the session unsynced.
    /// `Completed` is rejected; only [`Self::finalize`] completes a session.
    fn update_time_and_status(
        &self,
        session_id: &str,
        time_remaining_secs: u32,
        status: SessionStatus,
    ) -> impl Future<Output = Result<Option<TestSession>, PersistenceError>> + Send;

    /// Write final attempt states and complete the session in one
    /// transaction. Returns `None` if the session does not exist.
    fn finalize(
        &self,
        session_id: &str,
        attempts: &[Attempt],
        attempted_count: u32,
        total_score: f64,
        correct_count: u32,
    ) -> impl Future<Output = Result<Option<TestSession>, PersistenceError>> + Send;

    fn pending_attempts(&self)
        -> impl Future<Output = Result<Vec<Attempt>, PersistenceError>> + Send;

    fn pending_sessions(
        &self,
    ) -> impl Future<Output = Result<Vec<TestSession>, PersistenceError>> + Send;

    /// Rewrite each attempt in full with `is_synced = true`.
    fn mark_attempts_synced(
        &self,
        attempts: &[Attempt],
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Flag the given attempt snapshots as synced, but only where the stored
    /// row still matches the snapshot. Rows edited since the snapshot was
    /// read stay pending. Returns the number of rows flagged.
    fn mark_pushed_attempts_synced(
        &self,
        attempts: &[Attempt],
    ) -> impl Future<Output = Result<usize, PersistenceError>> + Send;

    /// Session counterpart of [`Self::mark_pushed_attempts_synced`].
    fn mark_sessions_synced(
        &self,
        sessions: &[TestSession],
    ) -> impl Future<Output = Result<usize, PersistenceError>> + Send;

    /// Remove a session and, by cascade, its attempts.
    fn delete_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}
