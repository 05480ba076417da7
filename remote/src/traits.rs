//! RemoteStore trait abstraction for remote implementations

use crate::error::RemoteResult;
use crate::report::QuestionReport;
use async_trait::async_trait;
use exam_model::{Attempt, Question, TestSession, TopicCount};

/// Remote store interface.
/// Implemented by the production backend adapter and by MockRemoteStore.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// The user's session with status in {ongoing, paused, created}, if any.
    async fn resumable_session(&self, user_id: &str) -> RemoteResult<Option<TestSession>>;

    /// All attempt rows of a session.
    async fn session_attempts(&self, session_id: &str) -> RemoteResult<Vec<Attempt>>;

    /// Questions whose id is in `ids`.
    async fn questions_by_ids(&self, ids: &[String]) -> RemoteResult<Vec<Question>>;

    /// Per-topic question counts for a subject.
    async fn topic_question_counts(&self, subject: &str) -> RemoteResult<Vec<TopicCount>>;

    /// Insert a report. A duplicate yields [`crate::RemoteError::AlreadyExists`].
    async fn report_question(&self, report: &QuestionReport) -> RemoteResult<()>;

    /// Insert or update a session row.
    async fn upsert_session(&self, session: &TestSession) -> RemoteResult<()>;

    /// Insert or update attempt rows.
    async fn upsert_attempts(&self, attempts: &[Attempt]) -> RemoteResult<()>;
}
