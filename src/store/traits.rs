use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::Script;

/// Ordered-set operations on keys held by a shared store.
///
/// Scores are millisecond timestamps. Members are opaque strings; two
/// members with the same score are two entries.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Removes every member of `key` whose score is strictly below `bound`.
    /// Returns the number of removed members.
    async fn remove_scores_below(&self, key: &str, bound: i64) -> Result<u64, StoreError>;

    /// Counts members of `key` with `lower <= score <= upper`.
    async fn count_in_range(&self, key: &str, lower: i64, upper: i64) -> Result<u64, StoreError>;

    /// Inserts `member` with `score`. Returns `false` if the member was already present.
    async fn add_scored(&self, key: &str, score: i64, member: &str) -> Result<bool, StoreError>;

    /// Sets or refreshes the TTL of `key`.
    async fn set_expiry(&self, key: &str, seconds: u64) -> Result<(), StoreError>;

    /// Runs `script` as one indivisible unit: no other client's operation on
    /// `keys` is interleaved between its reads and writes.
    async fn execute_atomically(
        &self,
        script: &Script,
        keys: &[String],
        args: &[String],
    ) -> Result<i64, StoreError>;
}

/// The same ordered-set operations, synchronous and scoped to a store that
/// already holds exclusive access. Native script bodies run against this.
pub trait ScoredSet {
    fn remove_scores_below(&mut self, key: &str, bound: i64) -> u64;

    fn count_in_range(&mut self, key: &str, lower: i64, upper: i64) -> u64;

    fn add_scored(&mut self, key: &str, score: i64, member: &str) -> bool;

    fn set_expiry(&mut self, key: &str, seconds: u64);
}

#[async_trait]
impl<S> WindowStore for Arc<S>
where
    S: WindowStore + ?Sized,
{
    async fn remove_scores_below(&self, key: &str, bound: i64) -> Result<u64, StoreError> {
        (**self).remove_scores_below(key, bound).await
    }

    async fn count_in_range(&self, key: &str, lower: i64, upper: i64) -> Result<u64, StoreError> {
        (**self).count_in_range(key, lower, upper).await
    }

    async fn add_scored(&self, key: &str, score: i64, member: &str) -> Result<bool, StoreError> {
        (**self).add_scored(key, score, member).await
    }

    async fn set_expiry(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        (**self).set_expiry(key, seconds).await
    }

    async fn execute_atomically(
        &self,
        script: &Script,
        keys: &[String],
        args: &[String],
    ) -> Result<i64, StoreError> {
        (**self).execute_atomically(script, keys, args).await
    }
}

// Trait objects, to support dynamic dispatch
#[async_trait]
impl WindowStore for Box<dyn WindowStore> {
    async fn remove_scores_below(&self, key: &str, bound: i64) -> Result<u64, StoreError> {
        (**self).remove_scores_below(key, bound).await
    }

    async fn count_in_range(&self, key: &str, lower: i64, upper: i64) -> Result<u64, StoreError> {
        (**self).count_in_range(key, lower, upper).await
    }

    async fn add_scored(&self, key: &str, score: i64, member: &str) -> Result<bool, StoreError> {
        (**self).add_scored(key, score, member).await
    }

    async fn set_expiry(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        (**self).set_expiry(key, seconds).await
    }

    async fn execute_atomically(
        &self,
        script: &Script,
        keys: &[String],
        args: &[String],
    ) -> Result<i64, StoreError> {
        (**self).execute_atomically(script, keys, args).await
    }
}
