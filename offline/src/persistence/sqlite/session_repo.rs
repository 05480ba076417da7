//! SQLite-backed repository for test sessions and their attempts.

use exam_model::{accuracy_percent, Attempt, Question, SessionStatus, TestSession};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeSet;

use super::helpers::{
    decode_json, decode_json_opt, encode_json, encode_json_opt, from_db, from_db_u32, to_db,
};
use super::question_repo::{fetch_questions_by_ids, upsert_questions};
use crate::persistence::traits::TestSessionRepository;
use crate::persistence::{now_timestamp, PersistenceError, SessionBundle};

const SESSION_COLUMNS: &str = r#"
    id, user_id, topics, status, time_remaining_secs, total_questions, total_marks,
    score, accuracy, correct_count, attempted_count, created_at, started_at,
    completed_at, updated_at, is_synced
"#;

const ATTEMPT_COLUMNS: &str = r#"
    session_id, question_id, attempt_order, user_answer, marked_for_review, status,
    is_correct, score, time_spent_secs, is_synced
"#;

/// Row type for session queries, mapped via `sqlx::FromRow`.
#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    topics: String,
    status: String,
    time_remaining_secs: i64,
    total_questions: i64,
    total_marks: i64,
    score: Option<f64>,
    accuracy: Option<i64>,
    correct_count: Option<i64>,
    attempted_count: Option<i64>,
    created_at: i64,
    started_at: Option<i64>,
    completed_at: Option<i64>,
    updated_at: i64,
    is_synced: bool,
}

impl TryFrom<SessionRow> for TestSession {
    type Error = PersistenceError;

    fn try_from(r: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            topics: decode_json(&r.topics)?,
            status: r.status.parse()?,
            time_remaining_secs: from_db_u32(r.time_remaining_secs),
            total_questions: from_db_u32(r.total_questions),
            total_marks: from_db_u32(r.total_marks),
            score: r.score,
            accuracy: r.accuracy.map(from_db_u32),
            correct_count: r.correct_count.map(from_db_u32),
            attempted_count: r.attempted_count.map(from_db_u32),
            created_at: from_db(r.created_at),
            started_at: r.started_at.map(from_db),
            completed_at: r.completed_at.map(from_db),
            updated_at: from_db(r.updated_at),
            is_synced: r.is_synced,
        })
    }
}

/// Row type for attempt queries, mapped via `sqlx::FromRow`.
#[derive(sqlx::FromRow)]
struct AttemptRow {
    session_id: String,
    question_id: String,
    attempt_order: i64,
    user_answer: Option<String>,
    marked_for_review: bool,
    status: String,
    is_correct: Option<bool>,
    score: f64,
    time_spent_secs: i64,
    is_synced: bool,
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = PersistenceError;

    fn try_from(r: AttemptRow) -> Result<Self, Self::Error> {
        Ok(Self {
            session_id: r.session_id,
            question_id: r.question_id,
            attempt_order: from_db_u32(r.attempt_order),
            user_answer: decode_json_opt(r.user_answer.as_deref())?,
            marked_for_review: r.marked_for_review,
            status: r.status.parse()?,
            is_correct: r.is_correct,
            score: r.score,
            time_spent_secs: from_db_u32(r.time_spent_secs),
            is_synced: r.is_synced,
        })
    }
}

fn into_sessions(rows: Vec<SessionRow>) -> Result<Vec<TestSession>, PersistenceError> {
    rows.into_iter().map(TestSession::try_from).collect()
}

fn into_attempts(rows: Vec<AttemptRow>) -> Result<Vec<Attempt>, PersistenceError> {
    rows.into_iter().map(Attempt::try_from).collect()
}

async fn upsert_session(
    conn: &mut SqliteConnection,
    s: &TestSession,
) -> Result<(), PersistenceError> {
    let topics = encode_json(&s.topics)?;

    // ON CONFLICT keeps the row in place; REPLACE would delete it and
    // cascade away its attempts.
    sqlx::query(
        r#"
        INSERT INTO sessions
            (id, user_id, topics, status, time_remaining_secs, total_questions, total_marks,
             score, accuracy, correct_count, attempted_count, created_at, started_at,
             completed_at, updated_at, is_synced)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            user_id = excluded.user_id,
            topics = excluded.topics,
            status = excluded.status,
            time_remaining_secs = excluded.time_remaining_secs,
            total_questions = excluded.total_questions,
            total_marks = excluded.total_marks,
            score = excluded.score,
            accuracy = excluded.accuracy,
            correct_count = excluded.correct_count,
            attempted_count = excluded.attempted_count,
            created_at = excluded.created_at,
            started_at = excluded.started_at,
            completed_at = excluded.completed_at,
            updated_at = excluded.updated_at,
            is_synced = excluded.is_synced
        "#,
    )
    .bind(&s.id)
    .bind(&s.user_id)
    .bind(topics)
    .bind(s.status.as_str())
    .bind(i64::from(s.time_remaining_secs))
    .bind(i64::from(s.total_questions))
    .bind(i64::from(s.total_marks))
    .bind(s.score)
    .bind(s.accuracy.map(i64::from))
    .bind(s.correct_count.map(i64::from))
    .bind(s.attempted_count.map(i64::from))
    .bind(to_db(s.created_at))
    .bind(s.started_at.map(to_db))
    .bind(s.completed_at.map(to_db))
    .bind(to_db(s.updated_at))
    .bind(s.is_synced)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Full overwrite of an attempt row, keyed by `(session_id, question_id)`.
async fn write_attempt(
    conn: &mut SqliteConnection,
    a: &Attempt,
    is_synced: bool,
) -> Result<(), PersistenceError> {
    let user_answer = encode_json_opt(a.user_answer.as_ref())?;

    sqlx::query(
        r#"
        INSERT OR REPLACE INTO attempts
            (session_id, question_id, attempt_order, user_answer, marked_for_review,
             status, is_correct, score, time_spent_secs, is_synced)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&a.session_id)
    .bind(&a.question_id)
    .bind(i64::from(a.attempt_order))
    .bind(user_answer)
    .bind(a.marked_for_review)
    .bind(a.status.as_str())
    .bind(a.is_correct)
    .bind(a.score)
    .bind(i64::from(a.time_spent_secs))
    .bind(is_synced)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn fetch_session(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> Result<Option<TestSession>, PersistenceError> {
    let row: Option<SessionRow> =
        sqlx::query_as(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?"))
            .bind(session_id)
            .fetch_optional(&mut *conn)
            .await?;
    row.map(TestSession::try_from).transpose()
}

/// SQLite implementation of [`TestSessionRepository`].
#[derive(Clone)]
pub struct SqliteTestSessionRepository {
    pool: SqlitePool,
}

impl SqliteTestSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl TestSessionRepository for SqliteTestSessionRepository {
    async fn initialize(
        &self,
        session: &TestSession,
        attempts: &[Attempt],
        questions: &[Question],
    ) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        upsert_session(&mut tx, session).await?;
        for attempt in attempts {
            write_attempt(&mut tx, attempt, attempt.is_synced).await?;
        }
        upsert_questions(&mut tx, questions).await?;

        tx.commit().await?;

        tracing::info!(
            session_id = %session.id,
            attempts = attempts.len(),
            questions = questions.len(),
            "Initialized local test session"
        );
        Ok(())
    }

    async fn load_session(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionBundle>, PersistenceError> {
        let mut conn = self.pool.acquire().await?;
        let Some(session) = fetch_session(&mut conn, session_id).await? else {
            return Ok(None);
        };

        let rows: Vec<AttemptRow> = sqlx::query_as(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE session_id = ? ORDER BY attempt_order"
        ))
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;
        let attempts = into_attempts(rows)?;
        // Release before the multi-get; in-memory pools hold one connection.
        drop(conn);

        let ids: Vec<String> = attempts
            .iter()
            .map(|a| a.question_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let questions = fetch_questions_by_ids(&self.pool, &ids).await?;

        Ok(Some(SessionBundle {
            session,
            attempts,
            questions,
        }))
    }

    async fn ongoing_sessions(&self) -> Result<Vec<TestSession>, PersistenceError> {
        let [a, b, c] = SessionStatus::RESUMABLE;
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE status IN (?, ?, ?) ORDER BY created_at DESC"
        ))
        .bind(a.as_str())
        .bind(b.as_str())
        .bind(c.as_str())
        .fetch_all(&self.pool)
        .await?;
        into_sessions(rows)
    }

    async fn save_attempt(&self, attempt: &Attempt) -> Result<(), PersistenceError> {
        let mut conn = self.pool.acquire().await?;
        write_attempt(&mut conn, attempt, attempt.is_synced).await
    }

    async fn update_time_and_status(
        &self,
        session_id: &str,
        time_remaining_secs: u32,
        status: SessionStatus,
    ) -> Result<Option<TestSession>, PersistenceError> {
        if status == SessionStatus::Completed {
            return Err(PersistenceError::CompleteWithoutFinalize(
                session_id.to_string(),
            ));
        }
        let now = to_db(now_timestamp());
        let mut tx = self.pool.begin().await?;

        // A completed session is terminal.
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET time_remaining_secs = ?,
                status = ?,
                started_at = CASE
                    WHEN started_at IS NULL AND ? = 'ongoing' THEN ?
                    ELSE started_at
                END,
                updated_at = ?,
                is_synced = 0
            WHERE id = ? AND status != 'completed'
            "#,
        )
        .bind(i64::from(time_remaining_secs))
        .bind(status.as_str())
        .bind(status.as_str())
        .bind(now)
        .bind(now)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(
                session_id,
                "update_time_and_status on missing or completed session"
            );
            return Ok(None);
        }

        let session = fetch_session(&mut tx, session_id).await?;
        tx.commit().await?;
        Ok(session)
    }

    async fn finalize(
        &self,
        session_id: &str,
        attempts: &[Attempt],
        attempted_count: u32,
        total_score: f64,
        correct_count: u32,
    ) -> Result<Option<TestSession>, PersistenceError> {
        let now = to_db(now_timestamp());
        let accuracy = accuracy_percent(correct_count, attempted_count);
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = 'completed',
                score = ?,
                accuracy = ?,
                correct_count = ?,
                attempted_count = ?,
                completed_at = ?,
                updated_at = ?,
                is_synced = 0
            WHERE id = ?
            "#,
        )
        .bind(total_score)
        .bind(i64::from(accuracy))
        .bind(i64::from(correct_count))
        .bind(i64::from(attempted_count))
        .bind(now)
        .bind(now)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        for attempt in attempts {
            write_attempt(&mut tx, attempt, attempt.is_synced).await?;
        }

        let session = fetch_session(&mut tx, session_id).await?;
        tx.commit().await?;

        tracing::info!(
            session_id,
            attempted_count,
            correct_count,
            accuracy,
            total_score,
            "Finalized test session"
        );
        Ok(session)
    }

    async fn pending_attempts(&self) -> Result<Vec<Attempt>, PersistenceError> {
        let rows: Vec<AttemptRow> = sqlx::query_as(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE is_synced = 0 ORDER BY session_id, attempt_order"
        ))
        .fetch_all(&self.pool)
        .await?;
        into_attempts(rows)
    }

    async fn pending_sessions(&self) -> Result<Vec<TestSession>, PersistenceError> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE is_synced = 0 ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        into_sessions(rows)
    }

    async fn mark_attempts_synced(&self, attempts: &[Attempt]) -> Result<(), PersistenceError> {
        if attempts.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for attempt in attempts {
            write_attempt(&mut tx, attempt, true).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn mark_pushed_attempts_synced(
        &self,
        attempts: &[Attempt],
    ) -> Result<usize, PersistenceError> {
        if attempts.is_empty() {
            return Ok(0);
        }
        let mut marked = 0;
        let mut tx = self.pool.begin().await?;
        for a in attempts {
            let user_answer = encode_json_opt(a.user_answer.as_ref())?;
            let result = sqlx::query(
                r#"
                UPDATE attempts SET is_synced = 1
                WHERE session_id = ? AND question_id = ?
                  AND attempt_order = ?
                  AND user_answer IS ?
                  AND marked_for_review = ?
                  AND status = ?
                  AND is_correct IS ?
                  AND score = ?
                  AND time_spent_secs = ?
                "#,
            )
            .bind(&a.session_id)
            .bind(&a.question_id)
            .bind(i64::from(a.attempt_order))
            .bind(user_answer)
            .bind(a.marked_for_review)
            .bind(a.status.as_str())
            .bind(a.is_correct)
            .bind(a.score)
            .bind(i64::from(a.time_spent_secs))
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() > 0 {
                marked += 1;
            }
        }
        tx.commit().await?;
        Ok(marked)
    }

    async fn mark_sessions_synced(
        &self,
        sessions: &[TestSession],
    ) -> Result<usize, PersistenceError> {
        if sessions.is_empty() {
            return Ok(0);
        }
        let mut marked = 0;
        let mut tx = self.pool.begin().await?;
        for s in sessions {
            let result = sqlx::query(
                r#"
                UPDATE sessions SET is_synced = 1
                WHERE id = ?
                  AND status = ?
                  AND time_remaining_secs = ?
                  AND updated_at = ?
                  AND score IS ?
                  AND accuracy IS ?
                  AND correct_count IS ?
                  AND attempted_count IS ?
                  AND started_at IS ?
                  AND completed_at IS ?
                "#,
            )
            .bind(&s.id)
            .bind(s.status.as_str())
            .bind(i64::from(s.time_remaining_secs))
            .bind(to_db(s.updated_at))
            .bind(s.score)
            .bind(s.accuracy.map(i64::from))
            .bind(s.correct_count.map(i64::from))
            .bind(s.attempted_count.map(i64::from))
            .bind(s.started_at.map(to_db))
            .bind(s.completed_at.map(to_db))
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() > 0 {
                marked += 1;
            }
        }
        tx.commit().await?;
        Ok(marked)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
