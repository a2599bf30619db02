use actix_web::{App, HttpServer, Responder, web};
use sliding_window_ratelimit::config::{RateLimitConfig, WindowConfig};
use sliding_window_ratelimit::store::RedisStore;
use sliding_window_ratelimit::{RateLimit, SlidingWindowLimiter};
use std::{io, sync::Arc, time::Duration};

async fn index() -> impl Responder {
    "Hello world!"
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let store = RedisStore::new("redis://127.0.0.1/0")
        .await
        .map_err(|err| io::Error::new(io::ErrorKind::ConnectionRefused, err))?;
    let window = WindowConfig::new(3, Duration::from_secs(10))
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

    // Every instance started with this prefix shares the same windows
    let limiter = Arc::new(SlidingWindowLimiter::new(window, store).with_prefix("myapp:ratelimit:"));
    let config = RateLimitConfig::default();

    HttpServer::new(move || {
        App::new()
            .wrap(RateLimit::new(config.clone(), limiter.clone()))
            .route("/", web::get().to(index))
    })
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}
