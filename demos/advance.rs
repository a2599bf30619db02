use actix_web::HttpResponse;
use actix_web::{App, HttpServer, Responder, web};
use sliding_window_ratelimit::config::{FailurePolicy, RateLimitConfig, WindowConfig};
use sliding_window_ratelimit::{RateLimit, SlidingWindowLimiter, store::MemoryStore};
use std::{sync::Arc, time::Duration};

async fn index() -> impl Responder {
    "Hello world!"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let window = WindowConfig::new(3, Duration::from_secs(10))
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    let limiter = Arc::new(
        SlidingWindowLimiter::new(window, MemoryStore::new())
            .with_prefix("demo:")
            .with_timeout(Duration::from_millis(50)),
    );

    let config = RateLimitConfig::default()
        .id(|req| {
            // Custom client identification
            req.headers()
                .get("X-Client-Id")
                .and_then(|h| h.to_str().ok())
                .unwrap_or("anonymous")
                .to_string()
        })
        .exceeded(|id, _req| {
            HttpResponse::TooManyRequests()
                .append_header(("Retry-After", "10"))
                .body(format!("429 caused: client-id: {id}"))
        })
        .store_error(|id, err, _req| {
            HttpResponse::ServiceUnavailable().body(format!("cannot rate limit {id}: {err}"))
        })
        .failure_policy(FailurePolicy::Closed);

    HttpServer::new(move || {
        App::new()
            .wrap(RateLimit::new(config.clone(), limiter.clone()))
            .route("/", web::get().to(index))
    })
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}
