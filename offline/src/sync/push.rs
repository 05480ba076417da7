use exam_model::Attempt;
use exam_remote::RemoteStore;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::persistence::{PersistenceError, TestSessionRepository};

/// Row counts from one [`PushService::push_pending`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PushReport {
    pub sessions_pushed: usize,
    pub sessions_failed: usize,
    pub attempts_pushed: usize,
    pub attempts_failed: usize,
}

impl PushReport {
    pub fn is_clean(&self) -> bool {
        self.sessions_failed == 0 && self.attempts_failed == 0
    }
}

/// Uploads locally modified sessions and attempts.
pub struct PushService<R: ?Sized, S> {
    remote: Arc<R>,
    sessions: S,
    guard: Mutex<()>,
}

impl<R, S> PushService<R, S>
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

    /// Push every pending row. Sessions go first; a session's attempts are
    /// held back when the session itself failed to upload. Rows that fail
    /// stay pending for the next run.
    pub async fn push_pending(&self) -> Result<PushReport, PersistenceError> {
        let _guard = self.guard.lock().await;
        let mut report = PushReport::default();

        let pending_sessions = self.sessions.pending_sessions().await?;
        let mut failed_sessions = BTreeSet::new();
        let mut pushed = Vec::new();

        for session in pending_sessions {
            match self.remote.upsert_session(&session).await {
                Ok(()) => pushed.push(session),
                Err(e) => {
                    tracing::warn!(session_id = %session.id, error = %e, "Session push failed");
                    failed_sessions.insert(session.id);
                }
            }
        }
        // Only rows still equal to what was uploaded are flagged; anything
        // edited in the meantime goes out on the next run.
        let marked = self.sessions.mark_sessions_synced(&pushed).await?;
        if marked < pushed.len() {
            tracing::debug!(changed = pushed.len() - marked, "Sessions edited during push stay pending");
        }
        report.sessions_pushed = pushed.len();
        report.sessions_failed = failed_sessions.len();

        let mut groups: BTreeMap<String, Vec<Attempt>> = BTreeMap::new();
        for attempt in self.sessions.pending_attempts().await? {
            groups
                .entry(attempt.session_id.clone())
                .or_default()
                .push(attempt);
        }

        for (session_id, attempts) in groups {
            if failed_sessions.contains(&session_id) {
                report.attempts_failed += attempts.len();
                continue;
            }
            match self.remote.upsert_attempts(&attempts).await {
                Ok(()) => {
                    let marked = self.sessions.mark_pushed_attempts_synced(&attempts).await?;
                    if marked < attempts.len() {
                        tracing::debug!(
                            %session_id,
                            changed = attempts.len() - marked,
                            "Attempts edited during push stay pending"
                        );
                    }
                    report.attempts_pushed += attempts.len();
                }
                Err(e) => {
                    tracing::warn!(%session_id, count = attempts.len(), error = %e, "Attempt push failed");
                    report.attempts_failed += attempts.len();
                }
            }
        }

        tracing::info!(
            sessions_pushed = report.sessions_pushed,
            sessions_failed = report.sessions_failed,
            attempts_pushed = report.attempts_pushed,
            attempts_failed = report.attempts_failed,
            "Push finished"
        );
        Ok(report)
    }
}
