//! SQLite-backed repository implementations.
//!
//! ## Database setup
//!
//! [`Database`] wraps a `sqlx::SqlitePool` configured with:
//! - **WAL mode**: one writer and multiple concurrent readers.
//! - **Foreign keys enabled**: attempts cascade with their session.
//! - **Embedded migrations**: `sqlx::migrate!` runs `migrations/*.sql`
//!   when [`Database::open`] is called. Applied versions are recorded in
//!   `_sqlx_migrations`, so later migrations can reshape indexes in place.
//!
//! ## Repository types
//!
//! Each repository holds a `SqlitePool` clone and implements the
//! corresponding trait from [`crate::persistence::traits`]:
//!
//! | Type | Trait |
//! |------|-------|
//! | [`SqliteQuestionRepository`] | `QuestionRepository` |
//! | [`SqliteTestSessionRepository`] | `TestSessionRepository` |
//!
//! Enum columns are stored as `TEXT` guarded by CHECK constraints; list and
//! nested values (options, tags, answers, metadata) are JSON `TEXT` columns
//! round-tripped through [`helpers`].

mod database;
mod question_repo;
mod session_repo;
pub(crate) mod helpers;

pub use database::{Database, StoreStats};
pub use question_repo::SqliteQuestionRepository;
pub use session_repo::SqliteTestSessionRepository;
