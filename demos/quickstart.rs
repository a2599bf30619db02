use std::time::Duration;

use sliding_window_ratelimit::config::WindowConfig;
use sliding_window_ratelimit::store::RedisStore;
use sliding_window_ratelimit::{RateLimiter, SlidingWindowLimiter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = RedisStore::new("redis://127.0.0.1/").await?;
    let config = WindowConfig::new(5, Duration::from_secs(60))?;
    let limiter = SlidingWindowLimiter::new(config, store);

    for i in 0..10 {
        let allowed = limiter.allow_request("user1").await?;
        println!("Request {}: {}", i + 1, if allowed { "Allowed" } else { "Denied" });
    }

    Ok(())
}
