//! Error types for the limiter and its stores.

use std::time::Duration;

use thiserror::Error;

/// Failures raised by a [`crate::store::WindowStore`] backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection, protocol or server-side error reported by Redis.
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The script could not run: bad arguments or an unsupported key layout.
    #[error("Script error: {0}")]
    Script(String),

    /// The store answered with something the caller cannot interpret.
    #[error("Unexpected store reply: {0}")]
    UnexpectedReply(String),
}

/// Main error type returned by the limiter.
///
/// A denied request is never an error: [`crate::RateLimiter::allow_request`]
/// returns `Ok(false)` for it. An `Err` means no decision could be made.
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected at construction time.
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// The caller passed an empty identity.
    #[error("Identity must not be empty")]
    InvalidIdentity,

    /// The backing store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The store did not answer within the configured deadline.
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type alias for limiter operations.
pub type Result<T> = std::result::Result<T, Error>;
