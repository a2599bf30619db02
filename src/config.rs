use std::time::Duration;

use crate::error::{Error, Result};

#[cfg(feature = "actix")]
pub use middleware_config::{FailurePolicy, RateLimitConfig};

/// The `(limit, window)` pair shared by every identity a limiter handles.
///
/// Validated once on construction and immutable afterwards.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use sliding_window_ratelimit::config::WindowConfig;
///
/// // 5 requests per minute
/// let config = WindowConfig::new(5, Duration::from_secs(60)).unwrap();
/// assert_eq!(config.window_millis(), 60_000);
///
/// assert!(WindowConfig::new(0, Duration::from_secs(60)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    limit: u64,
    window: Duration,
}

impl WindowConfig {
    /// Creates a configuration, rejecting a zero limit and any window shorter
    /// than one millisecond.
    pub fn new(limit: u64, window: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(Error::InvalidConfig("limit must be greater than zero".into()));
        }
        if window.as_millis() == 0 {
            return Err(Error::InvalidConfig(format!(
                "window must be at least 1ms, got {window:?}"
            )));
        }
        if i64::try_from(window.as_millis()).is_err() {
            return Err(Error::InvalidConfig(format!("window {window:?} is too large")));
        }

        Ok(Self { limit, window })
    }

    /// Same as [`WindowConfig::new`] with the window given in milliseconds.
    pub fn from_millis(limit: u64, window_ms: u64) -> Result<Self> {
        Self::new(limit, Duration::from_millis(window_ms))
    }

    /// Maximum number of admitted requests per window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Window length in whole milliseconds, the resolution of stored scores.
    pub fn window_millis(&self) -> i64 {
        // bounded in `new`
        self.window.as_millis() as i64
    }

    /// Key TTL in seconds: the window rounded up, so a key never expires
    /// while one of its entries can still count.
    pub fn ttl_secs(&self) -> u64 {
        let secs = self.window.as_secs();
        if self.window.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}

#[cfg(feature = "actix")]
mod middleware_config {
    use actix_web::{HttpResponse, dev::ServiceRequest};

    use crate::error::Error;

    /// What the middleware does when the limiter cannot reach a decision.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum FailurePolicy {
        /// Answer with [`RateLimitConfig::on_store_error`].
        #[default]
        Closed,
        /// Let the request through.
        Open,
    }

    /// Configuration for the rate limiting middleware.
    ///
    /// Holds the hooks that sit around the limiter: how a client is
    /// identified, what a denied client sees, and how store failures are
    /// answered.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use actix_web::HttpResponse;
    /// use sliding_window_ratelimit::config::{FailurePolicy, RateLimitConfig};
    ///
    /// let config = RateLimitConfig::default()
    ///     .id(|req| {
    ///         req.headers()
    ///             .get("X-API-Key")
    ///             .and_then(|h| h.to_str().ok())
    ///             .unwrap_or("anonymous")
    ///             .to_string()
    ///     })
    ///     .exceeded(|id, _req| {
    ///         HttpResponse::TooManyRequests().body(format!("slow down, {id}"))
    ///     })
    ///     .failure_policy(FailurePolicy::Open);
    /// ```
    #[derive(Clone)]
    pub struct RateLimitConfig {
        /// Extracts the client identity from the request. Real IP by default.
        pub get_id: fn(req: &ServiceRequest) -> String,
        /// Builds the response for a denied request. HTTP 429 by default.
        pub on_exceed: fn(id: &str, req: &ServiceRequest) -> HttpResponse,
        /// Builds the response when the limiter fails under [`FailurePolicy::Closed`].
        /// HTTP 503 by default.
        pub on_store_error: fn(id: &str, err: &Error, req: &ServiceRequest) -> HttpResponse,
        pub failure_policy: FailurePolicy,
    }

    impl Default for RateLimitConfig {
        fn default() -> Self {
            Self {
                get_id: |req| {
                    req.connection_info()
                        .realip_remote_addr()
                        .unwrap_or("-")
                        .to_string()
                },
                on_exceed: |_id, _req| HttpResponse::TooManyRequests().body("Too many requests"),
                on_store_error: |_id, _err, _req| {
                    HttpResponse::ServiceUnavailable().body("Rate limiter unavailable")
                },
                failure_policy: FailurePolicy::default(),
            }
        }
    }

    impl RateLimitConfig {
        /// Sets the function that extracts the client identity.
        ///
        /// An identity that comes back empty makes the limiter fail, which is
        /// then handled by the failure policy.
        pub fn id(mut self, fn_id: fn(req: &ServiceRequest) -> String) -> Self {
            self.get_id = fn_id;
            self
        }

        /// Sets the response builder for denied requests.
        pub fn exceeded(mut self, fn_exceed: fn(id: &str, req: &ServiceRequest) -> HttpResponse) -> Self {
            self.on_exceed = fn_exceed;
            self
        }

        /// Sets the response builder used when the limiter fails and the
        /// policy is [`FailurePolicy::Closed`].
        pub fn store_error(
            mut self,
            fn_error: fn(id: &str, err: &Error, req: &ServiceRequest) -> HttpResponse,
        ) -> Self {
            self.on_store_error = fn_error;
            self
        }

        pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
            self.failure_policy = policy;
            self
        }
    }
}
