//! SQLite database connection pool, migration runner and lifecycle.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::persistence::PersistenceError;

/// Row counts per container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct StoreStats {
    pub questions: u64,
    pub sync_metadata: u64,
    pub sessions: u64,
    pub attempts: u64,
    pub pending_sessions: u64,
    pub pending_attempts: u64,
}

/// Holds a connection pool to the local database.
///
/// Construct one per process (or per test) and hand `pool()` clones to the
/// repositories. [`Database::nuke`] consumes the handle, so nothing can use
/// it after the files are gone.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the database at `path`, run migrations, and return
    /// a ready-to-use `Database`.
    pub async fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(PersistenceError::Io)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(sqlx::Error::from)?;

        let db = Self {
            pool,
            path: Some(path.to_path_buf()),
        };
        db.run_migrations().await?;
        tracing::info!(path = %path.display(), "Opened local store");
        Ok(db)
    }

    /// Create an isolated in-memory database. Migrations are applied.
    ///
    /// The pool is pinned to a single long-lived connection; a second
    /// connection would see a different, empty database.
    pub async fn new_in_memory() -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(sqlx::Error::from)?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(sqlx::Error::from)?;

        let db = Self { pool, path: None };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run embedded migrations from `offline/migrations/`.
    async fn run_migrations(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PersistenceError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// On-disk location, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Row counts for every container.
    pub async fn stats(&self) -> Result<StoreStats, PersistenceError> {
        let (questions, sync_metadata, sessions, attempts, pending_sessions, pending_attempts): (
            i64,
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM questions),
                (SELECT COUNT(*) FROM questions_sync_metadata),
                (SELECT COUNT(*) FROM sessions),
                (SELECT COUNT(*) FROM attempts),
                (SELECT COUNT(*) FROM sessions WHERE is_synced = 0),
                (SELECT COUNT(*) FROM attempts WHERE is_synced = 0)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreStats {
            questions: questions as u64,
            sync_metadata: sync_metadata as u64,
            sessions: sessions as u64,
            attempts: attempts as u64,
            pending_sessions: pending_sessions as u64,
            pending_attempts: pending_attempts as u64,
        })
    }

    /// Close every connection, then erase the database files.
    ///
    /// Files that are already gone are fine; any other deletion failure is
    /// returned, since a half-deleted store after logout is worse than a
    /// visible error.
    pub async fn nuke(self) -> Result<(), PersistenceError> {
        self.pool.close().await;
        match self.path {
            Some(path) => {
                Self::delete_files(&path)?;
                tracing::info!(path = %path.display(), "Local store deleted");
            }
            None => tracing::info!("In-memory store closed"),
        }
        Ok(())
    }

    /// Remove the database file and its WAL/SHM siblings.
    pub fn delete_files(path: &Path) -> Result<(), PersistenceError> {
        let mut targets = vec![path.to_path_buf()];
        for suffix in ["-wal", "-shm"] {
            let mut sibling = path.as_os_str().to_owned();
            sibling.push(suffix);
            targets.push(PathBuf::from(sibling));
        }

        for target in targets {
            match std::fs::remove_file(&target) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(PersistenceError::Io(e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = Database::new_in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT 1")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 1);
        assert!(db.path().is_none());
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let db = Database::new_in_memory().await.unwrap();
        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert!(names.contains(&"questions"));
        assert!(names.contains(&"question_tags"));
        assert!(names.contains(&"questions_sync_metadata"));
        assert!(names.contains(&"sessions"));
        assert!(names.contains(&"attempts"));
    }

    #[tokio::test]
    async fn test_schema_version_recorded() {
        let db = Database::new_in_memory().await.unwrap();
        let (version,): (i64,) = sqlx::query_as("SELECT MAX(version) FROM _sqlx_migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn test_open_file_based() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("store.db");
        let db = Database::open(&db_path).await.unwrap();
        assert_eq!(db.stats().await.unwrap(), StoreStats::default());
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("store.db");
        let db = Database::open(&db_path).await.unwrap();
        sqlx::query(
            "INSERT INTO questions_sync_metadata (subject, last_fetched_at, last_sync) VALUES ('os', 1, 1)",
        )
        .execute(db.pool())
        .await
        .unwrap();
        db.pool().close().await;

        let db = Database::open(&db_path).await.unwrap();
        assert_eq!(db.stats().await.unwrap().sync_metadata, 1);
    }

    #[tokio::test]
    async fn test_nuke_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("store.db");
        let db = Database::open(&db_path).await.unwrap();
        db.nuke().await.unwrap();
        assert!(!db_path.exists());
        assert!(!dir.path().join("store.db-wal").exists());

        // a fresh handle starts empty
        let db = Database::open(&db_path).await.unwrap();
        assert_eq!(db.stats().await.unwrap(), StoreStats::default());
    }

    #[tokio::test]
    async fn test_delete_files_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("never-created.db");
        Database::delete_files(&db_path).unwrap();
        Database::delete_files(&db_path).unwrap();
    }

    #[tokio::test]
    async fn test_delete_files_propagates_failure() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the database file should be cannot be removed
        // with remove_file
        let db_path = dir.path().join("store.db");
        std::fs::create_dir(&db_path).unwrap();
        let err = Database::delete_files(&db_path).unwrap_err();
        assert!(matches!(err, PersistenceError::Io(_)));
    }
}
