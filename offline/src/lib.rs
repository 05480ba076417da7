//! Offline-first storage and sync for timed practice tests.
//!
//! - [`persistence`]: the SQLite store, question and session repositories
//! - [`topic_cache`]: file-backed TTL cache of topic counts
//! - [`sync`]: pull a resumable remote session, push pending local rows
//! - [`engine`]: drive an active test to completion

pub mod config;
pub mod engine;
pub mod persistence;
pub mod sync;
pub mod topic_cache;

pub use engine::{EngineError, SessionEngine, TestSummary};
pub use persistence::{
    now_timestamp, Database, PersistenceError, QuestionRepository, SessionBundle,
    SqliteQuestionRepository, SqliteTestSessionRepository, StoreStats, TestSessionRepository,
};
pub use sync::{PushReport, PushService, SyncOutcome, SyncService, SyncStep};
pub use topic_cache::{TopicCache, TopicCacheEntry, TopicSelection, DEFAULT_TOPIC_CACHE_TTL};
