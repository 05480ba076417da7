//! Controller for one active test: lifecycle, navigation, answers, timer
//! and final grading.
//!
//! Every mutation is written through to the [`TestSessionRepository`]
//! before the call returns, so a crash or reload resumes from the last
//! persisted step.

mod summary;

pub use summary::TestSummary;

use exam_model::{
    grade, validate_answer, Attempt, AttemptStatus, ModelError, Question, SessionStatus,
    TestSession, UserAnswer, DEFAULT_NUMERIC_TOLERANCE,
};
use std::collections::HashMap;

use crate::persistence::{PersistenceError, SessionBundle, TestSessionRepository};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Session {0} is already completed")]
    SessionCompleted(String),
    #[error("Session {0} no longer exists")]
    SessionMissing(String),
    #[error("Cannot move session from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
    #[error("Session is {0}, not ongoing")]
    NotOngoing(SessionStatus),
    #[error("Question index {index} out of range (0..{len})")]
    QuestionOutOfRange { index: usize, len: usize },
    #[error("Question {0} is not in the local store")]
    MissingQuestion(String),
    #[error("Invalid answer: {0}")]
    InvalidAnswer(#[from] ModelError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Drives a single loaded test session.
pub struct SessionEngine<S> {
    store: S,
    session: TestSession,
    attempts: Vec<Attempt>,
    questions: HashMap<String, Question>,
    current: usize,
    tolerance: f64,
    summary: Option<TestSummary>,
}

impl<S: TestSessionRepository> SessionEngine<S> {
    /// Load `session_id` from the store. `Ok(None)` when it does not exist.
    pub async fn load(store: S, session_id: &str) -> Result<Option<Self>, EngineError> {
        let Some(bundle) = store.load_session(session_id).await? else {
            return Ok(None);
        };
        Self::from_bundle(store, bundle).map(Some)
    }

    fn from_bundle(store: S, bundle: SessionBundle) -> Result<Self, EngineError> {
        let SessionBundle {
            session,
            mut attempts,
            questions,
        } = bundle;

        if session.status == SessionStatus::Completed {
            return Err(EngineError::SessionCompleted(session.id));
        }

        let questions: HashMap<String, Question> =
            questions.into_iter().map(|q| (q.id.clone(), q)).collect();
        if let Some(missing) = attempts
            .iter()
            .find(|a| !questions.contains_key(&a.question_id))
        {
            return Err(EngineError::MissingQuestion(missing.question_id.clone()));
        }
        attempts.sort_by_key(|a| a.attempt_order);

        Ok(Self {
            store,
            session,
            attempts,
            questions,
            current: 0,
            tolerance: DEFAULT_NUMERIC_TOLERANCE,
            summary: None,
        })
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn session(&self) -> &TestSession {
        &self.session
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_attempt(&self) -> Option<&Attempt> {
        self.attempts.get(self.current)
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current_attempt()
            .and_then(|a| self.questions.get(&a.question_id))
    }

    /// Final breakdown, available once the session has been submitted.
    pub fn summary(&self) -> Option<&TestSummary> {
        self.summary.as_ref()
    }

    // ── lifecycle ──────────────────────────────────────────────────────

    pub async fn start(&mut self) -> Result<(), EngineError> {
        self.require_from(SessionStatus::Created, SessionStatus::Ongoing)?;
        self.transition(SessionStatus::Ongoing).await?;
        self.visit_current().await
    }

    pub async fn pause(&mut self) -> Result<(), EngineError> {
        self.require_from(SessionStatus::Ongoing, SessionStatus::Paused)?;
        self.persist_current().await?;
        self.transition(SessionStatus::Paused).await
    }

    pub async fn resume(&mut self) -> Result<(), EngineError> {
        self.require_from(SessionStatus::Paused, SessionStatus::Ongoing)?;
        self.transition(SessionStatus::Ongoing).await?;
        self.visit_current().await
    }

    /// Grade every attempt, finalize the session and return its summary.
    pub async fn submit(&mut self) -> Result<TestSummary, EngineError> {
        let from = self.session.status;
        if !from.can_transition_to(SessionStatus::Completed) {
            return Err(EngineError::InvalidTransition {
                from,
                to: SessionStatus::Completed,
            });
        }

        let mut graded = self.attempts.clone();
        let mut attempted = 0u32;
        let mut correct = 0u32;
        let mut total_score = 0.0;
        for attempt in &mut graded {
            let question = self
                .questions
                .get(&attempt.question_id)
                .ok_or_else(|| EngineError::MissingQuestion(attempt.question_id.clone()))?;
            let result = grade(
                &question.kind,
                question.marks,
                attempt.user_answer.as_ref(),
                self.tolerance,
            )?;

            if attempt.user_answer.is_some() {
                attempted += 1;
                attempt.is_correct = Some(result.is_correct);
                if result.is_correct {
                    correct += 1;
                }
            } else {
                attempt.is_correct = None;
            }
            attempt.score = result.score;
            attempt.is_synced = false;
            total_score += result.score;
        }

        let session = self
            .store
            .finalize(&self.session.id, &graded, attempted, total_score, correct)
            .await?
            .ok_or_else(|| EngineError::SessionMissing(self.session.id.clone()))?;

        self.session = session;
        self.attempts = graded;
        let summary = TestSummary::from_attempts(&self.session, &self.attempts);
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    /// Advance the clock by `elapsed_secs`. Returns the summary when the
    /// remaining time ran out and the session was submitted.
    pub async fn tick(&mut self, elapsed_secs: u32) -> Result<Option<TestSummary>, EngineError> {
        self.require_ongoing()?;

        let remaining = self.session.time_remaining_secs.saturating_sub(elapsed_secs);
        if let Some(attempt) = self.attempts.get_mut(self.current) {
            attempt.time_spent_secs = attempt.time_spent_secs.saturating_add(elapsed_secs);
            attempt.is_synced = false;
        }
        self.persist_current().await?;
        self.session = self
            .store
            .update_time_and_status(&self.session.id, remaining, SessionStatus::Ongoing)
            .await?
            .ok_or_else(|| EngineError::SessionMissing(self.session.id.clone()))?;

        if remaining == 0 {
            tracing::info!(session_id = %self.session.id, "Time expired, submitting");
            return self.submit().await.map(Some);
        }
        Ok(None)
    }

    // ── navigation ─────────────────────────────────────────────────────

    pub async fn go_to(&mut self, index: usize) -> Result<(), EngineError> {
        self.require_ongoing()?;
        if index >= self.attempts.len() {
            return Err(EngineError::QuestionOutOfRange {
                index,
                len: self.attempts.len(),
            });
        }
        self.current = index;
        self.visit_current().await
    }

    /// Move forward one question. Returns `false` at the last question.
    pub async fn next(&mut self) -> Result<bool, EngineError> {
        self.require_ongoing()?;
        if self.current + 1 >= self.attempts.len() {
            return Ok(false);
        }
        self.go_to(self.current + 1).await?;
        Ok(true)
    }

    /// Move back one question. Returns `false` at the first question.
    pub async fn previous(&mut self) -> Result<bool, EngineError> {
        self.require_ongoing()?;
        if self.current == 0 {
            return Ok(false);
        }
        self.go_to(self.current - 1).await?;
        Ok(true)
    }

    // ── answers ────────────────────────────────────────────────────────

    pub async fn record_answer(&mut self, answer: UserAnswer) -> Result<(), EngineError> {
        self.require_ongoing()?;
        let question = self
            .current_question()
            .ok_or(EngineError::QuestionOutOfRange {
                index: self.current,
                len: self.attempts.len(),
            })?;
        validate_answer(&question.kind, &answer)?;

        let attempt = &mut self.attempts[self.current];
        attempt.user_answer = Some(answer);
        attempt.status = AttemptStatus::Answered;
        attempt.is_synced = false;
        self.persist_current().await
    }

    pub async fn clear_answer(&mut self) -> Result<(), EngineError> {
        self.require_ongoing()?;
        let attempt = self.current_attempt_mut()?;
        attempt.user_answer = None;
        attempt.status = AttemptStatus::Viewed;
        attempt.is_synced = false;
        self.persist_current().await
    }

    /// Flip the review flag on the current question; returns the new value.
    pub async fn toggle_review(&mut self) -> Result<bool, EngineError> {
        self.require_ongoing()?;
        let attempt = self.current_attempt_mut()?;
        attempt.marked_for_review = !attempt.marked_for_review;
        attempt.is_synced = false;
        let marked = attempt.marked_for_review;
        self.persist_current().await?;
        Ok(marked)
    }

    // ── internals ──────────────────────────────────────────────────────

    fn require_ongoing(&self) -> Result<(), EngineError> {
        match self.session.status {
            SessionStatus::Ongoing => Ok(()),
            other => Err(EngineError::NotOngoing(other)),
        }
    }

    fn require_from(&self, from: SessionStatus, to: SessionStatus) -> Result<(), EngineError> {
        if self.session.status == from {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                from: self.session.status,
                to,
            })
        }
    }

    fn current_attempt_mut(&mut self) -> Result<&mut Attempt, EngineError> {
        let len = self.attempts.len();
        self.attempts
            .get_mut(self.current)
            .ok_or(EngineError::QuestionOutOfRange {
                index: self.current,
                len,
            })
    }

    async fn transition(&mut self, to: SessionStatus) -> Result<(), EngineError> {
        let from = self.session.status;
        self.session = self
            .store
            .update_time_and_status(&self.session.id, self.session.time_remaining_secs, to)
            .await?
            .ok_or_else(|| EngineError::SessionMissing(self.session.id.clone()))?;
        tracing::debug!(session_id = %self.session.id, %from, %to, "Session transition");
        Ok(())
    }

    async fn visit_current(&mut self) -> Result<(), EngineError> {
        let Some(attempt) = self.attempts.get_mut(self.current) else {
            return Ok(());
        };
        if attempt.status == AttemptStatus::Unvisited {
            attempt.status = AttemptStatus::Viewed;
            attempt.is_synced = false;
            self.persist_current().await?;
        }
        Ok(())
    }

    async fn persist_current(&self) -> Result<(), EngineError> {
        if let Some(attempt) = self.attempts.get(self.current) {
            self.store.save_attempt(attempt).await?;
        }
        Ok(())
    }
}
