/*!
A distributed sliding-window rate limiter.

Given a caller identity, [`RateLimiter::allow_request`] decides whether the
caller's next request is admitted, based on how many requests that identity
made in the trailing window `[now - window, now]`. Windows live in a shared
store, so any number of processes enforce one limit together.

## Features

- **Atomic**: prune, count, admit and record run as one server-side script
- **Distributed**: Redis Sorted Sets shared by every limiter instance
- **Self-cleaning**: idle keys expire through the store's TTL, no sweeper
- **Honest failures**: a store failure is an `Err`, never a silent allow or deny
- **actix-web 4 middleware** with a configurable failure policy

## Quick Start

```toml
[dependencies]
sliding-window-ratelimit = "0.1"
```

### Limiter

```rust, no_run
# use std::time::Duration;
# use sliding_window_ratelimit::{RateLimiter, SlidingWindowLimiter};
# use sliding_window_ratelimit::config::WindowConfig;
# use sliding_window_ratelimit::store::RedisStore;
#
# #[tokio::main]
# async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 5 requests per minute per identity
    let config = WindowConfig::new(5, Duration::from_secs(60))?;
    let store = RedisStore::new("redis://127.0.0.1/").await?;
    let limiter = SlidingWindowLimiter::new(config, store);

    match limiter.allow_request("user1").await {
        Ok(true) => println!("allowed"),
        Ok(false) => println!("denied"),
        Err(err) => eprintln!("limiter unavailable: {err}"),
    }
#   Ok(())
# }
```

### Middleware

```rust, no_run
# use actix_web::{App, HttpServer, Responder, web};
# use sliding_window_ratelimit::{RateLimit, SlidingWindowLimiter};
# use sliding_window_ratelimit::config::{RateLimitConfig, WindowConfig};
# use sliding_window_ratelimit::store::MemoryStore;
# use std::{sync::Arc, time::Duration};
#
# async fn index() -> impl Responder {
#     "Hello world!"
# }
#
# #[actix_web::main]
# async fn main() -> std::io::Result<()> {
    let window = WindowConfig::new(3, Duration::from_secs(10)).expect("valid window");
    let limiter = Arc::new(SlidingWindowLimiter::new(window, MemoryStore::new()));
    let config = RateLimitConfig::default();

    HttpServer::new(move || {
        App::new()
            .wrap(RateLimit::new(config.clone(), limiter.clone()))
            .route("/", web::get().to(index))
    })
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
# }
```
 */
pub mod clock;
pub mod config;
pub mod error;
pub mod limiter;
#[cfg(feature = "actix")]
pub mod middleware;
pub mod store;

pub use error::{Error, Result};
pub use limiter::{RateLimiter, SLIDING_WINDOW, SlidingWindowLimiter};
#[cfg(feature = "actix")]
pub use middleware::{RateLimit, RateLimitMiddleware};
