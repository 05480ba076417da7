//! SQLite-backed repository for the cached question bank.

use exam_model::{Question, QuestionKind, QuestionSyncMetadata};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::{BTreeMap, BTreeSet};

use super::helpers::{decode_json, encode_json, from_db, from_db_u32, push_in_list, to_db};
use crate::persistence::now_timestamp;
use crate::persistence::traits::QuestionRepository;
use crate::persistence::PersistenceError;

/// Keeps `IN (...)` lists well under SQLite's bound-parameter limit.
const ID_CHUNK: usize = 500;

pub(super) const QUESTION_COLUMNS: &str = r#"
    id, year, question_number, subject, topic, question_text, difficulty, marks,
    answer_key, tags, source, verified, explanation, metadata, created_at, updated_at
"#;

/// Row type for question queries, mapped via `sqlx::FromRow`.
#[derive(sqlx::FromRow)]
pub(super) struct QuestionRow {
    id: String,
    year: i64,
    question_number: i64,
    subject: String,
    topic: Option<String>,
    question_text: String,
    difficulty: String,
    marks: i64,
    answer_key: String,
    tags: String,
    source: Option<String>,
    verified: bool,
    explanation: Option<String>,
    metadata: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<QuestionRow> for Question {
    type Error = PersistenceError;

    fn try_from(r: QuestionRow) -> Result<Self, Self::Error> {
        let kind: QuestionKind = decode_json(&r.answer_key)?;
        let tags: BTreeSet<String> = decode_json(&r.tags)?;
        Ok(Self {
            id: r.id,
            year: r.year.clamp(0, i64::from(u16::MAX)) as u16,
            question_number: from_db_u32(r.question_number),
            subject: r.subject,
            topic: r.topic,
            question_text: r.question_text,
            difficulty: r.difficulty.parse()?,
            marks: from_db_u32(r.marks),
            kind,
            tags,
            source: r.source,
            verified: r.verified,
            explanation: r.explanation,
            metadata: decode_json(&r.metadata)?,
            created_at: from_db(r.created_at),
            updated_at: from_db(r.updated_at),
        })
    }
}

fn into_questions(rows: Vec<QuestionRow>) -> Result<Vec<Question>, PersistenceError> {
    rows.into_iter().map(Question::try_from).collect()
}

/// Insert or replace questions and their tag rows on an open connection.
/// Shared with the session repository so a session hydrate is one transaction.
pub(super) async fn upsert_questions(
    conn: &mut SqliteConnection,
    questions: &[Question],
) -> Result<(), PersistenceError> {
    for q in questions {
        let answer_key = encode_json(&q.kind)?;
        let tags = encode_json(&q.tags)?;
        let metadata = encode_json(&q.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO questions
                (id, year, question_number, subject, topic, question_text, difficulty,
                 marks, question_type, answer_key, tags, source, verified, explanation,
                 metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                year = excluded.year,
                question_number = excluded.question_number,
                subject = excluded.subject,
                topic = excluded.topic,
                question_text = excluded.question_text,
                difficulty = excluded.difficulty,
                marks = excluded.marks,
                question_type = excluded.question_type,
                answer_key = excluded.answer_key,
                tags = excluded.tags,
                source = excluded.source,
                verified = excluded.verified,
                explanation = excluded.explanation,
                metadata = excluded.metadata,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&q.id)
        .bind(i64::from(q.year))
        .bind(i64::from(q.question_number))
        .bind(&q.subject)
        .bind(&q.topic)
        .bind(&q.question_text)
        .bind(q.difficulty.as_str())
        .bind(i64::from(q.marks))
        .bind(q.kind.question_type())
        .bind(answer_key)
        .bind(tags)
        .bind(&q.source)
        .bind(q.verified)
        .bind(&q.explanation)
        .bind(metadata)
        .bind(to_db(q.created_at))
        .bind(to_db(q.updated_at))
        .execute(&mut *conn)
        .await?;

        // Delete existing tags for this question before re-inserting
        sqlx::query("DELETE FROM question_tags WHERE question_id = ?")
            .bind(&q.id)
            .execute(&mut *conn)
            .await?;

        for tag in &q.tags {
            sqlx::query("INSERT INTO question_tags (question_id, tag) VALUES (?, ?)")
                .bind(&q.id)
                .bind(tag)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

/// Targeted multi-get by id.
pub(super) async fn fetch_questions_by_ids(
    pool: &SqlitePool,
    ids: &[String],
) -> Result<Vec<Question>, PersistenceError> {
    // Dedup first; a repeated id in a later chunk would be returned twice.
    let ids: Vec<String> = ids
        .iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .cloned()
        .collect();
    let mut questions = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(ID_CHUNK) {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id IN "
        ));
        push_in_list(&mut builder, chunk);
        let rows: Vec<QuestionRow> = builder.build_query_as().fetch_all(pool).await?;
        questions.extend(into_questions(rows)?);
    }
    Ok(questions)
}

/// SQLite implementation of [`QuestionRepository`].
pub struct SqliteQuestionRepository {
    pool: SqlitePool,
}

impl SqliteQuestionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ids of questions carrying `tag`.
    pub async fn question_ids_by_tag(&self, tag: &str) -> Result<Vec<String>, PersistenceError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT question_id FROM question_tags WHERE tag = ? ORDER BY question_id")
                .bind(tag)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

impl QuestionRepository for SqliteQuestionRepository {
    async fn questions_by_subject(&self, subject: &str) -> Result<Vec<Question>, PersistenceError> {
        let rows: Vec<QuestionRow> = sqlx::query_as(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE subject = ? ORDER BY year DESC, question_number"
        ))
        .bind(subject)
        .fetch_all(&self.pool)
        .await?;
        into_questions(rows)
    }

    async fn questions_by_topic(
        &self,
        subject: &str,
        topic: &str,
    ) -> Result<Vec<Question>, PersistenceError> {
        let rows: Vec<QuestionRow> = sqlx::query_as(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE subject = ? AND topic = ? ORDER BY year DESC, question_number"
        ))
        .bind(subject)
        .bind(topic)
        .fetch_all(&self.pool)
        .await?;
        into_questions(rows)
    }

    async fn all_questions(&self) -> Result<Vec<Question>, PersistenceError> {
        let rows: Vec<QuestionRow> =
            sqlx::query_as(&format!("SELECT {QUESTION_COLUMNS} FROM questions ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        into_questions(rows)
    }

    async fn questions_by_ids(&self, ids: &[String]) -> Result<Vec<Question>, PersistenceError> {
        fetch_questions_by_ids(&self.pool, ids).await
    }

    async fn sync_metadata(
        &self,
        subject: &str,
    ) -> Result<Option<QuestionSyncMetadata>, PersistenceError> {
        let row: Option<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT subject, last_fetched_at, last_sync
            FROM questions_sync_metadata
            WHERE subject = ?
            "#,
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(subject, last_fetched_at, last_sync)| QuestionSyncMetadata {
            subject,
            last_fetched_at: from_db(last_fetched_at),
            last_sync: from_db(last_sync),
        }))
    }

    async fn bulk_upsert(&self, questions: &[Question]) -> Result<(), PersistenceError> {
        if questions.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        upsert_questions(&mut *tx, questions).await?;

        // Each subject in the batch is replaced wholesale: ids it no longer
        // carries are dropped.
        let mut batch: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for q in questions {
            batch
                .entry(q.subject.as_str())
                .or_default()
                .insert(q.id.as_str());
        }
        let mut pruned = 0u64;
        for (subject, keep) in &batch {
            let existing: Vec<(String,)> = sqlx::query_as("SELECT id FROM questions WHERE subject = ?")
                .bind(*subject)
                .fetch_all(&mut *tx)
                .await?;
            let stale: Vec<String> = existing
                .into_iter()
                .map(|(id,)| id)
                .filter(|id| !keep.contains(id.as_str()))
                .collect();
            for chunk in stale.chunks(ID_CHUNK) {
                let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM questions WHERE id IN ");
                push_in_list(&mut builder, chunk);
                pruned += builder.build().execute(&mut *tx).await?.rows_affected();
            }
        }
        tx.commit().await?;

        tracing::debug!(count = questions.len(), pruned, "Upserted questions");
        Ok(())
    }

    async fn update_sync_metadata(
        &self,
        subject: &str,
        last_fetched_at: Option<u64>,
    ) -> Result<(), PersistenceError> {
        let now = to_db(now_timestamp());

        match last_fetched_at {
            Some(fetched_at) => {
                sqlx::query(
                    r#"
                    INSERT INTO questions_sync_metadata (subject, last_fetched_at, last_sync)
                    VALUES (?, ?, ?)
                    ON CONFLICT(subject) DO UPDATE SET
                        last_fetched_at = excluded.last_fetched_at,
                        last_sync = excluded.last_sync
                    "#,
                )
                .bind(subject)
                .bind(to_db(fetched_at))
                .bind(now)
                .execute(&self.pool)
                .await?;
            }
            None => {
                let result =
                    sqlx::query("UPDATE questions_sync_metadata SET last_sync = ? WHERE subject = ?")
                        .bind(now)
                        .bind(subject)
                        .execute(&self.pool)
                        .await?;
                if result.rows_affected() == 0 {
                    return Err(PersistenceError::MissingRow {
                        table: "questions_sync_metadata",
                        key: subject.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
