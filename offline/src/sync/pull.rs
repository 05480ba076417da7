use exam_model::Question;
use exam_remote::RemoteStore;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::persistence::{PersistenceError, TestSessionRepository};

/// Remote fetch that failed during a pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    Session,
    Attempts,
    Questions,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncStep::Session => "session",
            SyncStep::Attempts => "attempts",
            SyncStep::Questions => "questions",
        })
    }
}

/// What a pull did.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// A resumable session already exists locally; nothing was fetched.
    LocalSessionPresent { session_id: String },
    /// The user has no resumable session upstream.
    NoRemoteSession,
    /// A remote fetch failed; no local state was written.
    Aborted { step: SyncStep, reason: String },
    /// The remote session was written to the local store.
    Hydrated {
        session_id: String,
        attempts: usize,
        questions: usize,
    },
}

/// Pulls a resumable remote session into the local store.
///
/// Concurrent `pull` calls on the same service run one at a time, so two
/// overlapping calls cannot both see an empty store and hydrate twice.
pub struct SyncService<R: ?Sized, S> {
    remote: Arc<R>,
    sessions: S,
    guard: Mutex<()>,
}

impl<R, S> SyncService<R, S>
where
    R: RemoteStore + ?Sized,
    S: TestSessionRepository,
{
    pub fn new(remote: Arc<R>, sessions: S) -> Self {
        Self {
            remote,
            sessions,
            guard: Mutex::new(()),
        }
    }

    /// Run the pull protocol for `user_id`.
    ///
    /// Remote failures and a missing remote session are reported through
    /// [`SyncOutcome`]; only local store failures are errors.
    pub async fn pull(&self, user_id: &str) -> Result<SyncOutcome, PersistenceError> {
        let _guard = self.guard.lock().await;

        let local = self.sessions.ongoing_sessions().await?;
        if let Some(existing) = local.first() {
            if local.len() > 1 {
                tracing::warn!(count = local.len(), "More than one resumable local session");
            }
            tracing::debug!(session_id = %existing.id, "Local session present, skipping pull");
            return Ok(SyncOutcome::LocalSessionPresent {
                session_id: existing.id.clone(),
            });
        }

        let mut session = match self.remote.resumable_session(user_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::info!(user_id, "No resumable remote session");
                return Ok(SyncOutcome::NoRemoteSession);
            }
            Err(e) => return Ok(abort(SyncStep::Session, e)),
        };

        let mut attempts = match self.remote.session_attempts(&session.id).await {
            Ok(attempts) => attempts,
            Err(e) => return Ok(abort(SyncStep::Attempts, e)),
        };

        let ids: Vec<String> = attempts
            .iter()
            .map(|a| a.question_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let questions = if ids.is_empty() {
            Vec::new()
        } else {
            match self.remote.questions_by_ids(&ids).await {
                Ok(questions) => questions,
                Err(e) => return Ok(abort(SyncStep::Questions, e)),
            }
        };

        let missing = missing_questions(&ids, &questions);
        if !missing.is_empty() {
            return Ok(abort(
                SyncStep::Questions,
                format!("remote returned no row for {}", missing.join(", ")),
            ));
        }

        // Rows copied from upstream have nothing left to push.
        session.is_synced = true;
        for attempt in &mut attempts {
            attempt.is_synced = true;
        }

        self.sessions
            .initialize(&session, &attempts, &questions)
            .await?;

        tracing::info!(
            session_id = %session.id,
            attempts = attempts.len(),
            questions = questions.len(),
            "Hydrated remote session"
        );
        Ok(SyncOutcome::Hydrated {
            session_id: session.id,
            attempts: attempts.len(),
            questions: questions.len(),
        })
    }
}

fn abort(step: SyncStep, reason: impl fmt::Display) -> SyncOutcome {
    let reason = reason.to_string();
    tracing::warn!(%step, %reason, "Sync aborted");
    SyncOutcome::Aborted { step, reason }
}

fn missing_questions(ids: &[String], questions: &[Question]) -> Vec<String> {
    let found: BTreeSet<&str> = questions.iter().map(|q| q.id.as_str()).collect();
    ids.iter()
        .filter(|id| !found.contains(id.as_str()))
        .cloned()
        .collect()
}
