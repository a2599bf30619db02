use async_trait::async_trait;
use dashmap::DashMap;
use std::{collections::HashMap, sync::Arc};

use crate::{
    clock::{Clock, SystemClock},
    error::StoreError,
    store::{ScoredSet, Script, WindowStore},
};

/// In-process implementation of [`WindowStore`] based on dashmap.
///
/// Each key is a sorted set of `member -> score` with an optional expiry
/// deadline read against the store's clock. Scripts run while the key's
/// shard is write-locked, which makes them atomic within this process only;
/// use [`crate::store::RedisStore`] to share limits across processes.
pub struct MemoryStore {
    entries: DashMap<String, SortedEntry>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Default)]
struct SortedEntry {
    members: HashMap<String, i64>,
    expires_at: Option<i64>,
}

impl SortedEntry {
    // same rule as Redis: a key is gone once the clock has passed its deadline
    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if at < now)
    }

    fn expire_if_due(&mut self, now: i64) {
        if self.is_expired(now) {
            self.members.clear();
            self.expires_at = None;
        }
    }
}

/// Exclusive view of one key while its shard lock is held.
struct LockedKey<'a> {
    entry: &'a mut SortedEntry,
    now: i64,
}

// The key arguments are ignored: the view is already bound to its key.
impl ScoredSet for LockedKey<'_> {
    fn remove_scores_below(&mut self, _key: &str, bound: i64) -> u64 {
        let before = self.entry.members.len();
        self.entry.members.retain(|_, score| *score >= bound);
        (before - self.entry.members.len()) as u64
    }

    fn count_in_range(&mut self, _key: &str, lower: i64, upper: i64) -> u64 {
        self.entry
            .members
            .values()
            .filter(|score| (lower..=upper).contains(*score))
            .count() as u64
    }

    fn add_scored(&mut self, _key: &str, score: i64, member: &str) -> bool {
        self.entry.members.insert(member.to_string(), score).is_none()
    }

    fn set_expiry(&mut self, _key: &str, seconds: u64) {
        // EXPIRE on a missing key is a no-op
        if !self.entry.members.is_empty() {
            let ttl_ms = i64::try_from(seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
            self.entry.expires_at = Some(self.now.saturating_add(ttl_ms));
        }
    }
}

impl MemoryStore {
    /// Creates a store that reads expiry deadlines from the system clock.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use sliding_window_ratelimit::store::MemoryStore;
    ///
    /// let store = Arc::new(MemoryStore::new());
    /// ```
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a store whose TTLs are evaluated against `clock`. Share the
    /// limiter's clock here so expiry and admission see the same time.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of keys still alive.
    pub fn key_count(&self) -> usize {
        let now = self.clock.now_millis();
        self.entries
            .iter()
            .filter(|entry| !entry.is_expired(now) && !entry.members.is_empty())
            .count()
    }

    /// Remaining lifetime of `key` in milliseconds, `None` if it has no TTL or does not exist.
    pub fn ttl_millis(&self, key: &str) -> Option<i64> {
        let now = self.clock.now_millis();
        let entry = self.entries.get(key)?;
        if entry.is_expired(now) {
            return None;
        }
        entry.expires_at.map(|at| at - now)
    }

    fn with_key<T>(&self, key: &str, f: impl FnOnce(&mut LockedKey<'_>) -> T) -> T {
        let now = self.clock.now_millis();
        let result = {
            let mut entry = self.entries.entry(key.to_string()).or_default();
            entry.expire_if_due(now);
            let mut view = LockedKey {
                entry: entry.value_mut(),
                now,
            };
            f(&mut view)
        };
        // a sorted set with no members does not exist
        self.entries.remove_if(key, |_, entry| entry.members.is_empty());
        result
    }
}

/// Equivalent to MemoryStore::new() method.
impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WindowStore for MemoryStore {
    async fn remove_scores_below(&self, key: &str, bound: i64) -> Result<u64, StoreError> {
        Ok(self.with_key(key, |set| set.remove_scores_below(key, bound)))
    }

    async fn count_in_range(&self, key: &str, lower: i64, upper: i64) -> Result<u64, StoreError> {
        Ok(self.with_key(key, |set| set.count_in_range(key, lower, upper)))
    }

    async fn add_scored(&self, key: &str, score: i64, member: &str) -> Result<bool, StoreError> {
        Ok(self.with_key(key, |set| set.add_scored(key, score, member)))
    }

    async fn set_expiry(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        self.with_key(key, |set| set.set_expiry(key, seconds));
        Ok(())
    }

    async fn execute_atomically(
        &self,
        script: &Script,
        keys: &[String],
        args: &[String],
    ) -> Result<i64, StoreError> {
        let [key] = keys else {
            return Err(StoreError::Script(format!(
                "memory store runs single-key scripts only, `{}` got {} keys",
                script.name(),
                keys.len()
            )));
        };

        self.with_key(key, |set| script.run_native(set, keys, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::parse_arg;
    use std::time::Duration;

    fn store_at(now: i64) -> (Arc<ManualClock>, MemoryStore) {
        let clock = Arc::new(ManualClock::new(now));
        let store = MemoryStore::with_clock(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn test_remove_scores_below_is_exclusive() {
        let (_clock, store) = store_at(0);
        store.add_scored("k", 10, "a").await.unwrap();
        store.add_scored("k", 20, "b").await.unwrap();
        store.add_scored("k", 30, "c").await.unwrap();

        let removed = store.remove_scores_below("k", 20).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count_in_range("k", i64::MIN, i64::MAX).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_count_in_range_is_inclusive() {
        let (_clock, store) = store_at(0);
        for (score, member) in [(5, "a"), (10, "b"), (15, "c"), (20, "d")] {
            store.add_scored("k", score, member).await.unwrap();
        }

        assert_eq!(store.count_in_range("k", 10, 15).await.unwrap(), 2);
        assert_eq!(store.count_in_range("k", 21, 30).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_same_score_distinct_members_both_count() {
        let (_clock, store) = store_at(0);
        assert!(store.add_scored("k", 7, "7-a").await.unwrap());
        assert!(store.add_scored("k", 7, "7-b").await.unwrap());
        assert!(!store.add_scored("k", 7, "7-b").await.unwrap());

        assert_eq!(store.count_in_range("k", 7, 7).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_key_expires_after_ttl() {
        let (clock, store) = store_at(1_000);
        store.add_scored("k", 1_000, "a").await.unwrap();
        store.set_expiry("k", 2).await.unwrap();
        assert_eq!(store.ttl_millis("k"), Some(2_000));

        clock.advance(Duration::from_millis(2_000));
        assert_eq!(store.key_count(), 1);

        clock.advance(Duration::from_millis(1));
        assert_eq!(store.key_count(), 0);
        assert_eq!(store.count_in_range("k", i64::MIN, i64::MAX).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expiry_on_missing_key_is_noop() {
        let (_clock, store) = store_at(0);
        store.set_expiry("ghost", 10).await.unwrap();
        assert_eq!(store.key_count(), 0);
        assert_eq!(store.ttl_millis("ghost"), None);
    }

    #[tokio::test]
    async fn test_execute_atomically_runs_native_body() {
        static INSERT: Script = Script::new("insert", "", |set, keys, args| {
            let score: i64 = parse_arg(args, 0, "score")?;
            set.add_scored(&keys[0], score, &args[1]);
            Ok(set.count_in_range(&keys[0], i64::MIN, i64::MAX) as i64)
        });

        let (_clock, store) = store_at(0);
        let keys = vec!["k".to_string()];
        let reply = store
            .execute_atomically(&INSERT, &keys, &["3".to_string(), "m".to_string()])
            .await
            .unwrap();
        assert_eq!(reply, 1);
    }

    #[tokio::test]
    async fn test_execute_atomically_rejects_multi_key_scripts() {
        static NOOP: Script = Script::new("noop", "return 0", |_, _, _| Ok(0));

        let (_clock, store) = store_at(0);
        let keys = vec!["a".to_string(), "b".to_string()];
        let err = store.execute_atomically(&NOOP, &keys, &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::Script(_)));
    }
}
