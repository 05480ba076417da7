//! Persistent TTL cache of per-subject topic counts, plus the selection
//! state the test generator derives from them.

use exam_model::TopicCount;
use exam_remote::{RemoteResult, RemoteStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::persistence::{now_timestamp, JsonStore, PersistenceError, Storable};

/// Default time-to-live for cached topic counts.
pub const DEFAULT_TOPIC_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// One cached document, stored as `<dir>/<subject>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCacheEntry {
    pub subject: String,
    pub topics: Vec<TopicCount>,
    pub cached_at: u64,
}

impl Storable for TopicCacheEntry {
    fn key(&self) -> &str {
        &self.subject
    }
}

/// File-backed topic count cache. Survives process restarts; entries expire
/// `ttl` after they were written.
pub struct TopicCache {
    store: JsonStore<TopicCacheEntry>,
    ttl: Duration,
}

impl TopicCache {
    pub fn new(dir: PathBuf, ttl: Duration) -> Self {
        Self {
            store: JsonStore::new(dir),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached topics for `subject`, or `None` when absent, expired, unreadable
    /// or stamped later than the current clock.
    pub fn get(&self, subject: &str) -> Option<Vec<TopicCount>> {
        self.get_at(subject, now_timestamp())
    }

    /// Same as [`TopicCache::get`], evaluated at unix time `now`.
    pub fn get_at(&self, subject: &str, now: u64) -> Option<Vec<TopicCount>> {
        let entry = match self.store.load(subject) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(subject, error = %e, "Unreadable topic cache entry, treating as miss");
                return None;
            }
        };

        if entry.cached_at > now {
            tracing::debug!(subject, cached_at = entry.cached_at, now, "Topic cache entry from the future");
            return None;
        }
        if now - entry.cached_at >= self.ttl.as_secs() {
            tracing::debug!(subject, cached_at = entry.cached_at, "Topic cache entry expired");
            return None;
        }
        Some(entry.topics)
    }

    pub fn put(&self, subject: &str, topics: &[TopicCount]) -> Result<(), PersistenceError> {
        self.put_at(subject, topics, now_timestamp())
    }

    pub fn put_at(
        &self,
        subject: &str,
        topics: &[TopicCount],
        cached_at: u64,
    ) -> Result<(), PersistenceError> {
        self.store.save(&TopicCacheEntry {
            subject: subject.to_string(),
            topics: topics.to_vec(),
            cached_at,
        })
    }

    /// Read-through: serve a fresh entry, otherwise fetch from `remote` and
    /// write the result back. A failed write-back is logged, not returned.
    pub async fn get_or_fetch<R: RemoteStore + ?Sized>(
        &self,
        subject: &str,
        remote: &R,
    ) -> RemoteResult<Vec<TopicCount>> {
        if let Some(topics) = self.get(subject) {
            tracing::debug!(subject, "Topic cache hit");
            return Ok(topics);
        }

        let topics = remote.topic_question_counts(subject).await?;
        if let Err(e) = self.put(subject, &topics) {
            tracing::warn!(subject, error = %e, "Failed to write topic cache entry");
        }
        tracing::info!(subject, topics = topics.len(), "Fetched topic counts");
        Ok(topics)
    }

    pub fn invalidate(&self, subject: &str) -> Result<(), PersistenceError> {
        self.store.delete(subject)
    }

    pub fn clear(&self) -> Result<(), PersistenceError> {
        self.store.clear()
    }
}

/// Topic picker state for the test generator.
///
/// Only the topic list and the selected names are stored; the pool size and
/// the generate flag are recomputed on every call.
#[derive(Debug, Clone, Default)]
pub struct TopicSelection {
    topics: Vec<TopicCount>,
    selected: BTreeSet<String>,
}

impl TopicSelection {
    pub fn new(topics: Vec<TopicCount>) -> Self {
        Self {
            topics,
            selected: BTreeSet::new(),
        }
    }

    pub fn topics(&self) -> &[TopicCount] {
        &self.topics
    }

    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    pub fn is_selected(&self, topic: &str) -> bool {
        self.selected.contains(topic)
    }

    /// Flip `topic`. Returns whether it is selected afterwards; unknown
    /// topics are ignored and report `false`.
    pub fn toggle(&mut self, topic: &str) -> bool {
        if !self.topics.iter().any(|t| t.topic == topic) {
            return false;
        }
        if !self.selected.remove(topic) {
            self.selected.insert(topic.to_string());
            return true;
        }
        false
    }

    pub fn select_all(&mut self) {
        self.selected = self.topics.iter().map(|t| t.topic.clone()).collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Sum of question counts across the selected topics.
    pub fn pool_size(&self) -> u32 {
        self.topics
            .iter()
            .filter(|t| self.selected.contains(&t.topic))
            .map(|t| t.question_count)
            .fold(0u32, u32::saturating_add)
    }

    pub fn can_generate(&self, requested: u32) -> bool {
        requested > 0 && self.pool_size() >= requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_remote::{MockCall, MockRemoteStore, RemoteError};

    fn counts() -> Vec<TopicCount> {
        vec![
            TopicCount::new("Paging", 12),
            TopicCount::new("Scheduling", 8),
            TopicCount::new("Deadlocks", 5),
        ]
    }

    fn cache(dir: &tempfile::TempDir) -> TopicCache {
        TopicCache::new(dir.path().join("topic_cache"), DEFAULT_TOPIC_CACHE_TTL)
    }

    #[test]
    fn test_roundtrip_within_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir);
        cache.put_at("OS", &counts(), 1_000).unwrap();
        assert_eq!(cache.get_at("OS", 1_000), Some(counts()));
        assert_eq!(cache.get_at("OS", 1_000 + 3_599), Some(counts()));
    }

    #[test]
    fn test_miss_after_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir);
        cache.put_at("OS", &counts(), 1_000).unwrap();
        assert_eq!(cache.get_at("OS", 1_000 + 3_600), None);
        assert_eq!(cache.get_at("OS", 50_000), None);
    }

    #[test]
    fn test_future_timestamp_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir);
        // written before the clock was set back
        cache.put_at("OS", &counts(), 5_000).unwrap();
        assert_eq!(cache.get_at("OS", 1_000), None);
        assert_eq!(cache.get_at("OS", 4_999), None);
        assert_eq!(cache.get_at("OS", 5_000), Some(counts()));
    }

    #[test]
    fn test_absent_and_corrupt_entries_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir);
        assert_eq!(cache.get("OS"), None);

        std::fs::create_dir_all(dir.path().join("topic_cache")).unwrap();
        std::fs::write(dir.path().join("topic_cache").join("OS.json"), "{ not json").unwrap();
        assert_eq!(cache.get("OS"), None);
    }

    #[test]
    fn test_survives_new_handle() {
        let dir = tempfile::tempdir().unwrap();
        cache(&dir).put("OS", &counts()).unwrap();
        assert_eq!(cache(&dir).get("OS"), Some(counts()));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir);
        cache.put("OS", &counts()).unwrap();
        cache.put("DBMS", &counts()).unwrap();

        cache.invalidate("OS").unwrap();
        assert_eq!(cache.get("OS"), None);
        assert!(cache.get("DBMS").is_some());

        cache.clear().unwrap();
        assert_eq!(cache.get("DBMS"), None);
    }

    #[tokio::test]
    async fn test_get_or_fetch_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir);
        let remote = MockRemoteStore::new().with_topic_counts_response(|_| Ok(counts()));

        assert_eq!(cache.get_or_fetch("OS", &remote).await.unwrap(), counts());
        assert_eq!(cache.get_or_fetch("OS", &remote).await.unwrap(), counts());

        let fetches = remote
            .get_calls()
            .into_iter()
            .filter(|c| matches!(c, MockCall::TopicQuestionCounts { .. }))
            .count();
        assert_eq!(fetches, 1);
        assert_eq!(cache.get("OS"), Some(counts()));
    }

    #[tokio::test]
    async fn test_get_or_fetch_propagates_remote_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(&dir);
        let remote = MockRemoteStore::new()
            .with_topic_counts_response(|_| Err(RemoteError::Request("offline".to_string())));

        let err = cache.get_or_fetch("OS", &remote).await.unwrap_err();
        assert_eq!(err, RemoteError::Request("offline".to_string()));
        assert_eq!(cache.get("OS"), None);
    }

    #[test]
    fn test_selection_pool_size() {
        let mut selection = TopicSelection::new(counts());
        assert_eq!(selection.pool_size(), 0);

        assert!(selection.toggle("Paging"));
        assert!(selection.toggle("Deadlocks"));
        assert_eq!(selection.pool_size(), 17);

        assert!(!selection.toggle("Paging"));
        assert_eq!(selection.pool_size(), 5);

        selection.select_all();
        assert_eq!(selection.pool_size(), 25);

        selection.clear();
        assert_eq!(selection.pool_size(), 0);
        assert_eq!(selection.selected().count(), 0);
    }

    #[test]
    fn test_toggle_unknown_topic_is_ignored() {
        let mut selection = TopicSelection::new(counts());
        assert!(!selection.toggle("Compilers"));
        assert!(!selection.is_selected("Compilers"));
    }

    #[test]
    fn test_can_generate() {
        let mut selection = TopicSelection::new(counts());
        assert!(!selection.can_generate(1));

        selection.toggle("Scheduling");
        assert!(selection.can_generate(8));
        assert!(!selection.can_generate(9));
        assert!(!selection.can_generate(0));
    }
}
