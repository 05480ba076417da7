//! Mock RemoteStore implementation for testing

use crate::error::{RemoteError, RemoteResult};
use crate::report::QuestionReport;
use crate::traits::RemoteStore;
use async_trait::async_trait;
use exam_model::{Attempt, Question, TestSession, TopicCount};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

type Responder<A, T> = Box<dyn Fn(A) -> RemoteResult<T> + Send>;

/// Scriptable remote store. Reads answer from configured closures and
/// return `NotConfigured` otherwise; writes succeed unless a failure is
/// configured. Reports emulate the remote unique constraint.
pub struct MockRemoteStore {
    responses: Arc<Mutex<MockResponses>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    reported: Arc<Mutex<HashSet<(String, String)>>>,
}

#[derive(Default)]
struct MockResponses {
    resumable_session: Option<Responder<String, Option<TestSession>>>,
    session_attempts: Option<Responder<String, Vec<Attempt>>>,
    questions_by_ids: Option<Responder<Vec<String>, Vec<Question>>>,
    topic_question_counts: Option<Responder<String, Vec<TopicCount>>>,
    upsert_session: Option<Responder<TestSession, ()>>,
    upsert_attempts: Option<Responder<Vec<Attempt>, ()>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    ResumableSession { user_id: String },
    SessionAttempts { session_id: String },
    QuestionsByIds { ids: Vec<String> },
    TopicQuestionCounts { subject: String },
    ReportQuestion { report: QuestionReport },
    UpsertSession { session_id: String },
    UpsertAttempts { count: usize },
}

impl Default for MockRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(MockResponses::default())),
            call_log: Arc::new(Mutex::new(Vec::new())),
            reported: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Configure resumable_session response
    pub fn with_resumable_session_response<F>(self, f: F) -> Self
    where
        F: Fn(String) -> RemoteResult<Option<TestSession>> + Send + 'static,
    {
        self.responses.lock().unwrap().resumable_session = Some(Box::new(f));
        self
    }

    /// Configure session_attempts response
    pub fn with_session_attempts_response<F>(self, f: F) -> Self
    where
        F: Fn(String) -> RemoteResult<Vec<Attempt>> + Send + 'static,
    {
        self.responses.lock().unwrap().session_attempts = Some(Box::new(f));
        self
    }

    /// Configure questions_by_ids response
    pub fn with_questions_response<F>(self, f: F) -> Self
    where
        F: Fn(Vec<String>) -> RemoteResult<Vec<Question>> + Send + 'static,
    {
        self.responses.lock().unwrap().questions_by_ids = Some(Box::new(f));
        self
    }

    /// Configure topic_question_counts response
    pub fn with_topic_counts_response<F>(self, f: F) -> Self
    where
        F: Fn(String) -> RemoteResult<Vec<TopicCount>> + Send + 'static,
    {
        self.responses.lock().unwrap().topic_question_counts = Some(Box::new(f));
        self
    }

    /// Configure upsert_session response
    pub fn with_upsert_session_response<F>(self, f: F) -> Self
    where
        F: Fn(TestSession) -> RemoteResult<()> + Send + 'static,
    {
        self.responses.lock().unwrap().upsert_session = Some(Box::new(f));
        self
    }

    /// Configure upsert_attempts response
    pub fn with_upsert_attempts_response<F>(self, f: F) -> Self
    where
        F: Fn(Vec<Attempt>) -> RemoteResult<()> + Send + 'static,
    {
        self.responses.lock().unwrap().upsert_attempts = Some(Box::new(f));
        self
    }

    /// Pre-configure a remote holding one resumable session with its
    /// attempts and the questions they reference.
    pub fn with_session(
        self,
        session: TestSession,
        attempts: Vec<Attempt>,
        questions: Vec<Question>,
    ) -> Self {
        let owner = session.user_id.clone();
        let session_id = session.id.clone();
        self.with_resumable_session_response(move |user_id| {
            Ok((user_id == owner).then(|| session.clone()))
        })
        .with_session_attempts_response(move |id| {
            Ok(if id == session_id {
                attempts.clone()
            } else {
                Vec::new()
            })
        })
        .with_questions_response(move |ids| {
            Ok(questions
                .iter()
                .filter(|q| ids.contains(&q.id))
                .cloned()
                .collect())
        })
    }

    /// Get recorded calls for verification
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Clear call history
    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear()
    }

    fn record(&self, call: MockCall) {
        self.call_log.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn resumable_session(&self, user_id: &str) -> RemoteResult<Option<TestSession>> {
        self.record(MockCall::ResumableSession {
            user_id: user_id.to_string(),
        });
        let responses = self.responses.lock().unwrap();
        match responses.resumable_session {
            Some(ref f) => f(user_id.to_string()),
            None => Err(RemoteError::NotConfigured("resumable_session".to_string())),
        }
    }

    async fn session_attempts(&self, session_id: &str) -> RemoteResult<Vec<Attempt>> {
        self.record(MockCall::SessionAttempts {
            session_id: session_id.to_string(),
        });
        let responses = self.responses.lock().unwrap();
        match responses.session_attempts {
            Some(ref f) => f(session_id.to_string()),
            None => Err(RemoteError::NotConfigured("session_attempts".to_string())),
        }
    }

    async fn questions_by_ids(&self, ids: &[String]) -> RemoteResult<Vec<Question>> {
        self.record(MockCall::QuestionsByIds { ids: ids.to_vec() });
        let responses = self.responses.lock().unwrap();
        match responses.questions_by_ids {
            Some(ref f) => f(ids.to_vec()),
            None => Err(RemoteError::NotConfigured("questions_by_ids".to_string())),
        }
    }

    async fn topic_question_counts(&self, subject: &str) -> RemoteResult<Vec<TopicCount>> {
        self.record(MockCall::TopicQuestionCounts {
            subject: subject.to_string(),
        });
        let responses = self.responses.lock().unwrap();
        match responses.topic_question_counts {
            Some(ref f) => f(subject.to_string()),
            None => Err(RemoteError::NotConfigured(
                "topic_question_counts".to_string(),
            )),
        }
    }

    async fn report_question(&self, report: &QuestionReport) -> RemoteResult<()> {
        self.record(MockCall::ReportQuestion {
            report: report.clone(),
        });
        let key = (report.user_id.clone(), report.question_id.clone());
        if !self.reported.lock().unwrap().insert(key) {
            return Err(RemoteError::AlreadyExists(format!(
                "question_reports({}, {})",
                report.user_id, report.question_id
            )));
        }
        Ok(())
    }

    async fn upsert_session(&self, session: &TestSession) -> RemoteResult<()> {
        self.record(MockCall::UpsertSession {
            session_id: session.id.clone(),
        });
        let responses = self.responses.lock().unwrap();
        match responses.upsert_session {
            Some(ref f) => f(session.clone()),
            None => Ok(()),
        }
    }

    async fn upsert_attempts(&self, attempts: &[Attempt]) -> RemoteResult<()> {
        self.record(MockCall::UpsertAttempts {
            count: attempts.len(),
        });
        let responses = self.responses.lock().unwrap();
        match responses.upsert_attempts {
            Some(ref f) => f(attempts.to_vec()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(user: &str, question: &str) -> QuestionReport {
        QuestionReport {
            user_id: user.to_string(),
            question_id: question.to_string(),
            reason: "wrong_answer".to_string(),
            details: None,
        }
    }

    #[tokio::test]
    async fn duplicate_report_is_already_exists() {
        let remote = MockRemoteStore::new();
        remote.report_question(&report("u1", "q1")).await.unwrap();
        let err = remote.report_question(&report("u1", "q1")).await.unwrap_err();
        assert!(err.is_already_exists());
        // another user may report the same question
        remote.report_question(&report("u2", "q1")).await.unwrap();
    }

    #[tokio::test]
    async fn unconfigured_read_fails() {
        let remote = MockRemoteStore::new();
        let err = remote.resumable_session("u1").await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::NotConfigured("resumable_session".to_string())
        );
        assert_eq!(
            remote.get_calls(),
            vec![MockCall::ResumableSession {
                user_id: "u1".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn topic_counts_response_receives_subject() {
        let remote = MockRemoteStore::new().with_topic_counts_response(|subject| {
            Ok(vec![TopicCount::new(format!("{subject}-graphs"), 7)])
        });
        let counts = remote.topic_question_counts("algo").await.unwrap();
        assert_eq!(counts, vec![TopicCount::new("algo-graphs", 7)]);
    }
}
