use std::{sync::Arc, time::Duration};

use actix_web::{App, HttpServer, Responder, web};
use sliding_window_ratelimit::{
    RateLimit, SlidingWindowLimiter,
    config::{RateLimitConfig, WindowConfig},
    store::MemoryStore,
};

async fn index() -> impl Responder {
    "Hello world!"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Allow 3 requests per 10-second window
    let window = WindowConfig::new(3, Duration::from_secs(10))
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;

    // In-process store; one limiter shared by every worker thread
    let limiter = Arc::new(SlidingWindowLimiter::new(window, MemoryStore::new()));

    println!("🚀 Starting server at http://127.0.0.1:8080");
    println!(
        "📊 Rate limit: {} requests per {} seconds",
        window.limit(),
        window.window().as_secs()
    );
    println!("🧪 Test with: curl http://localhost:8080/");

    HttpServer::new(move || {
        App::new()
            .wrap(RateLimit::new(RateLimitConfig::default(), limiter.clone()))
            .route("/", web::get().to(index))
    })
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}
