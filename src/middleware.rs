use actix_service::{Service, Transform};
use actix_web::{
    Error,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
};
use futures_util::future::{LocalBoxFuture, Ready, ok};
use log::error;
use std::{
    rc::Rc,
    sync::Arc,
    task::{Context, Poll},
};

use crate::{
    RateLimiter,
    config::{FailurePolicy, RateLimitConfig},
};

/// actix-web middleware factory that puts a [`RateLimiter`] in front of a service.
///
/// The limiter decides; this layer maps the decision to HTTP and owns the
/// policy for limiter failures (see [`FailurePolicy`]).
pub struct RateLimit<L>
where
    L: RateLimiter,
{
    limiter: Arc<L>,
    config: Arc<RateLimitConfig>,
}

impl<L> RateLimit<L>
where
    L: RateLimiter,
{
    pub fn new(config: RateLimitConfig, limiter: L) -> Self {
        Self {
            limiter: Arc::new(limiter),
            config: Arc::new(config),
        }
    }
}

impl<S, B, L> Transform<S, ServiceRequest> for RateLimit<L>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    L: RateLimiter + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitMiddleware {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            config: self.config.clone(),
        })
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    limiter: Arc<dyn RateLimiter>,
    config: Arc<RateLimitConfig>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = Arc::clone(&self.limiter);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let id = (config.get_id)(&req);

            match limiter.allow_request(&id).await {
                Ok(true) => {}
                Ok(false) => {
                    let res = (config.on_exceed)(&id, &req);
                    return Ok(req.into_response(res).map_into_right_body());
                }
                Err(err) => match config.failure_policy {
                    FailurePolicy::Open => {
                        error!("Rate limiter failed for {}, letting request through: {}", id, err);
                    }
                    FailurePolicy::Closed => {
                        error!("Rate limiter failed for {}, rejecting request: {}", id, err);
                        let res = (config.on_store_error)(&id, &err, &req);
                        return Ok(req.into_response(res).map_into_right_body());
                    }
                },
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        SlidingWindowLimiter,
        clock::ManualClock,
        config::WindowConfig,
        error::StoreError,
        store::{MemoryStore, Script, WindowStore},
    };
    use actix_web::{App, HttpResponse, http::StatusCode, test, web};
    use async_trait::async_trait;

    struct DownStore;

    #[async_trait]
    impl WindowStore for DownStore {
        async fn remove_scores_below(&self, _: &str, _: i64) -> Result<u64, StoreError> {
            Err(StoreError::Script("connection refused".into()))
        }

        async fn count_in_range(&self, _: &str, _: i64, _: i64) -> Result<u64, StoreError> {
            Err(StoreError::Script("connection refused".into()))
        }

        async fn add_scored(&self, _: &str, _: i64, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Script("connection refused".into()))
        }

        async fn set_expiry(&self, _: &str, _: u64) -> Result<(), StoreError> {
            Err(StoreError::Script("connection refused".into()))
        }

        async fn execute_atomically(&self, _: &Script, _: &[String], _: &[String]) -> Result<i64, StoreError> {
            Err(StoreError::Script("connection refused".into()))
        }
    }

    fn by_header() -> RateLimitConfig {
        RateLimitConfig::default().id(|req| {
            req.headers()
                .get("X-Client-Id")
                .and_then(|h| h.to_str().ok())
                .unwrap_or("anonymous")
                .to_string()
        })
    }

    fn memory_limiter(limit: u64) -> SlidingWindowLimiter<MemoryStore> {
        let clock = Arc::new(ManualClock::new(0));
        let config = WindowConfig::from_millis(limit, 60_000).unwrap();
        SlidingWindowLimiter::new(config, MemoryStore::with_clock(clock.clone())).with_clock(clock)
    }

    fn down_limiter() -> SlidingWindowLimiter<DownStore> {
        let config = WindowConfig::from_millis(1, 60_000).unwrap();
        SlidingWindowLimiter::new(config, DownStore)
    }

    async fn index() -> HttpResponse {
        HttpResponse::Ok().body("ok")
    }

    #[actix_web::test]
    async fn test_denies_with_429_after_limit() {
        let app = test::init_service(
            App::new()
                .wrap(RateLimit::new(by_header(), memory_limiter(2)))
                .route("/", web::get().to(index)),
        )
        .await;

        for _ in 0..2 {
            let req = test::TestRequest::get().uri("/").insert_header(("X-Client-Id", "a")).to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get().uri("/").insert_header(("X-Client-Id", "a")).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::TOO_MANY_REQUESTS);

        let req = test::TestRequest::get().uri("/").insert_header(("X-Client-Id", "b")).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_custom_exceeded_response() {
        let config = by_header().exceeded(|id, _req| HttpResponse::Forbidden().body(format!("no more for {id}")));
        let app = test::init_service(
            App::new()
                .wrap(RateLimit::new(config, memory_limiter(1)))
                .route("/", web::get().to(index)),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "no more for anonymous");
    }

    #[actix_web::test]
    async fn test_store_failure_fails_closed_by_default() {
        let app = test::init_service(
            App::new()
                .wrap(RateLimit::new(by_header(), down_limiter()))
                .route("/", web::get().to(index)),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn test_store_failure_fails_open_when_configured() {
        let config = by_header().failure_policy(FailurePolicy::Open);
        let app = test::init_service(
            App::new()
                .wrap(RateLimit::new(config, down_limiter()))
                .route("/", web::get().to(index)),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_empty_identity_goes_through_failure_policy() {
        let config = RateLimitConfig::default()
            .id(|_req| String::new())
            .store_error(|_id, _err, _req| HttpResponse::BadRequest().finish());
        let app = test::init_service(
            App::new()
                .wrap(RateLimit::new(config, memory_limiter(5)))
                .route("/", web::get().to(index)),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
