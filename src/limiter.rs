//! Sliding window admission.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::WindowConfig;
use crate::error::{Error, Result, StoreError};
use crate::store::{ScoredSet, Script, WindowStore, parse_arg};

/// Default namespace for store keys.
pub const DEFAULT_PREFIX: &str = "rate-limiter:";

/// Decides whether an identity may make another request.
///
/// `Ok(true)` admits, `Ok(false)` denies. `Err` means no decision was made
/// (store unreachable, script fault, timeout); what to do then is up to the
/// caller.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn allow_request(&self, identity: &str) -> Result<bool>;
}

#[async_trait]
impl<L> RateLimiter for Arc<L>
where
    L: RateLimiter + ?Sized,
{
    async fn allow_request(&self, identity: &str) -> Result<bool> {
        (**self).allow_request(identity).await
    }
}

/// Prune, count, admit and record in one step.
///
/// `KEYS[1]` is the window key. `ARGV` holds `now`, `window` (both in ms),
/// `limit`, the member to record and the key TTL in seconds. Replies `1` on
/// admission, `0` on denial. A denial writes nothing.
pub static SLIDING_WINDOW: Script = Script::new(
    "sliding_window",
    r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local member = ARGV[4]
local ttl = tonumber(ARGV[5])
local start = now - window

redis.call('ZREMRANGEBYSCORE', key, '-inf', string.format('(%d', start))

local count = redis.call('ZCOUNT', key, start, now)
if count < limit then
  redis.call('ZADD', key, now, member)
  redis.call('EXPIRE', key, ttl)
  return 1
end
return 0
"#,
    sliding_window_native,
);

fn sliding_window_native(
    set: &mut dyn ScoredSet,
    keys: &[String],
    args: &[String],
) -> std::result::Result<i64, StoreError> {
    let key = keys
        .first()
        .ok_or_else(|| StoreError::Script("sliding_window needs one key".into()))?;
    let now: i64 = parse_arg(args, 0, "now")?;
    let window: i64 = parse_arg(args, 1, "window")?;
    let limit: u64 = parse_arg(args, 2, "limit")?;
    let member = args
        .get(3)
        .ok_or_else(|| StoreError::Script("missing argument `member` at position 3".into()))?;
    let ttl: u64 = parse_arg(args, 4, "ttl")?;
    let start = now - window;

    set.remove_scores_below(key, start);

    let count = set.count_in_range(key, start, now);
    if count < limit {
        set.add_scored(key, now, member);
        set.set_expiry(key, ttl);
        return Ok(1);
    }
    Ok(0)
}

/// Distributed sliding window rate limiter.
///
/// Holds no per-identity state: every call runs [`SLIDING_WINDOW`] against
/// the shared store, which is the only point of mutual exclusion. Any number
/// of instances, in any number of processes, can share one store as long as
/// they use the same prefix and configuration.
///
/// # Examples
///
/// ```rust
/// # #[tokio::main]
/// # async fn main() -> sliding_window_ratelimit::error::Result<()> {
/// use std::time::Duration;
/// use sliding_window_ratelimit::{RateLimiter, SlidingWindowLimiter};
/// use sliding_window_ratelimit::config::WindowConfig;
/// use sliding_window_ratelimit::store::MemoryStore;
///
/// let config = WindowConfig::new(2, Duration::from_secs(60))?;
/// let limiter = SlidingWindowLimiter::new(config, MemoryStore::new());
///
/// assert!(limiter.allow_request("user1").await?);
/// assert!(limiter.allow_request("user1").await?);
/// assert!(!limiter.allow_request("user1").await?);
/// # Ok(())
/// # }
/// ```
pub struct SlidingWindowLimiter<S> {
    store: S,
    config: WindowConfig,
    prefix: String,
    clock: Arc<dyn Clock>,
    timeout: Option<Duration>,
}

impl<S: WindowStore> SlidingWindowLimiter<S> {
    pub fn new(config: WindowConfig, store: S) -> Self {
        Self {
            store,
            config,
            prefix: DEFAULT_PREFIX.to_string(),
            clock: Arc::new(SystemClock),
            timeout: None,
        }
    }

    /// Sets the key namespace. Replicas sharing a store must agree on it.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fails a call with [`Error::Timeout`] when the store takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Store key for `identity`.
    pub fn key_for(&self, identity: &str) -> String {
        format!("{}{}", self.prefix, identity)
    }

    async fn admit(&self, key: &str, now: i64) -> Result<bool> {
        let keys = [key.to_string()];
        let args = [
            now.to_string(),
            self.config.window_millis().to_string(),
            self.config.limit().to_string(),
            // score stays the timestamp; the suffix keeps same-ms requests apart
            format!("{}-{}", now, Uuid::new_v4().simple()),
            self.config.ttl_secs().to_string(),
        ];

        let call = self.store.execute_atomically(&SLIDING_WINDOW, &keys, &args);
        let reply = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| Error::Timeout(limit))??,
            None => call.await?,
        };

        match reply {
            1 => Ok(true),
            0 => Ok(false),
            other => Err(StoreError::UnexpectedReply(format!(
                "{} returned {other}",
                SLIDING_WINDOW.name()
            ))
            .into()),
        }
    }
}

#[async_trait]
impl<S: WindowStore> RateLimiter for SlidingWindowLimiter<S> {
    async fn allow_request(&self, identity: &str) -> Result<bool> {
        if identity.is_empty() {
            return Err(Error::InvalidIdentity);
        }

        let now = self.clock.now_millis();
        let key = self.key_for(identity);
        let allowed = self.admit(&key, now).await?;

        if allowed {
            debug!("Request admitted for {} (key {}, now {})", identity, key, now);
        } else {
            warn!(
                "Rate limit exceeded for {}: limit {} per {:?}",
                identity,
                self.config.limit(),
                self.config.window()
            );
        }
        Ok(allowed)
    }
}

/// Keeps the timestamps that are still inside the window ending at `now`.
pub fn filter_valid_timestamps(timestamps: &[i64], window_ms: i64, now: i64) -> Vec<i64> {
    timestamps
        .iter()
        .copied()
        .filter(|t| now - t < window_ms)
        .collect()
}
