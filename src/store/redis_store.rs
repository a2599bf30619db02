use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;
use redis::{Client, RedisError, aio::MultiplexedConnection};

use crate::{
    error::StoreError,
    store::{Script, WindowStore},
};

/// Redis-based implementation of [`WindowStore`] using Redis Sorted Sets.
///
/// Suitable for distributed applications: every limiter instance pointed at
/// the same Redis sees the same windows, and scripts run atomically on the
/// server, so admission is serialized across processes.
///
/// # Redis Data Structure
///
/// - Key: chosen by the caller (the limiter namespaces it)
/// - Score: request timestamp in milliseconds
/// - Member: caller supplied, unique per request
///
/// # Failures
///
/// Every Redis error is returned as [`StoreError::Redis`]. The store never
/// substitutes a result for a failed command.
pub struct RedisStore {
    /// Multiplexed connection, cloned per call
    conn: MultiplexedConnection,
    /// Loaded scripts by name, so the SHA1 is computed once
    scripts: DashMap<&'static str, redis::Script>,
}

impl RedisStore {
    /// Connects to Redis and checks the connection with `PING`.
    ///
    /// # URL Format
    ///
    /// `redis://[<username>][:<password>@]<hostname>[:port][/<db>]`
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # async fn connect() -> Result<(), redis::RedisError> {
    /// use sliding_window_ratelimit::store::RedisStore;
    ///
    /// let store = RedisStore::new("redis://127.0.0.1/").await?;
    ///
    /// // With authentication and specific database
    /// let store = RedisStore::new("redis://:password@127.0.0.1:6379/1").await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`RedisError`] if the URL is invalid, the server cannot be
    /// reached or `PING` fails.
    pub async fn new(redis_url: &str) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(Self::from_connection(conn))
    }

    /// Wraps an already established connection.
    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            scripts: DashMap::new(),
        }
    }

    fn loaded(&self, script: &Script) -> redis::Script {
        self.scripts
            .entry(script.name())
            .or_insert_with(|| redis::Script::new(script.lua()))
            .clone()
    }
}

#[async_trait]
impl WindowStore for RedisStore {
    async fn remove_scores_below(&self, key: &str, bound: i64) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg("-inf")
            .arg(format!("({bound}"))
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }

    async fn count_in_range(&self, key: &str, lower: i64, upper: i64) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let count: u64 = redis::cmd("ZCOUNT")
            .arg(key)
            .arg(lower)
            .arg(upper)
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn add_scored(&self, key: &str, score: i64, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let added: u64 = redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(added == 1)
    }

    async fn set_expiry(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Runs the script's Lua body with `EVALSHA`, loading it on a cache miss.
    async fn execute_atomically(
        &self,
        script: &Script,
        keys: &[String],
        args: &[String],
    ) -> Result<i64, StoreError> {
        let lua = self.loaded(script);
        let mut invocation = lua.prepare_invoke();
        for key in keys {
            invocation.key(key);
        }
        for arg in args {
            invocation.arg(arg);
        }

        debug!("Running script {} on keys {:?}", script.name(), keys);

        let mut conn = self.conn.clone();
        let reply: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(reply)
    }
}
