//! Per-client request throttling.
//!
//! Two fixed windows per (client IP, path) key: one minute and one hour. Counters live in
//! moka caches whose time-to-live equals the window, so a window resets when its entry
//! expires.

use crate::errors::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{Extensions, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use moka::future::Cache;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Seconds a throttled client is told to wait.
pub const RETRY_AFTER_SECS: u64 = 60;

const MAX_TRACKED_KEYS: u64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { limit: u64, remaining: u64 },
    Limited,
}

/// Fixed-window limiter shared through application state.
#[derive(Clone)]
pub struct RateLimiter {
    per_minute: u64,
    per_hour: u64,
    minute_window: Cache<String, Arc<AtomicU64>>,
    hour_window: Cache<String, Arc<AtomicU64>>,
}

impl RateLimiter {
    pub fn new(per_minute: u64, per_hour: u64) -> Self {
        Self::with_windows(
            per_minute,
            per_hour,
            Duration::from_secs(60),
            Duration::from_secs(3600),
        )
    }

    /// Limiter with custom window lengths.
    pub fn with_windows(
        per_minute: u64,
        per_hour: u64,
        minute: Duration,
        hour: Duration,
    ) -> Self {
        Self {
            per_minute,
            per_hour,
            minute_window: Cache::builder()
                .time_to_live(minute)
                .max_capacity(MAX_TRACKED_KEYS)
                .build(),
            hour_window: Cache::builder()
                .time_to_live(hour)
                .max_capacity(MAX_TRACKED_KEYS)
                .build(),
        }
    }

    /// Counts one request against `key`; rejected requests are not counted.
    pub async fn check(&self, key: &str) -> RateDecision {
        let minute = self
            .minute_window
            .get_with(key.to_string(), async { Arc::new(AtomicU64::new(0)) })
            .await;
        let hour = self
            .hour_window
            .get_with(key.to_string(), async { Arc::new(AtomicU64::new(0)) })
            .await;

        let minute_count = minute.fetch_add(1, Ordering::SeqCst) + 1;
        if minute_count > self.per_minute {
            minute.fetch_sub(1, Ordering::SeqCst);
            return RateDecision::Limited;
        }

        let hour_count = hour.fetch_add(1, Ordering::SeqCst) + 1;
        if hour_count > self.per_hour {
            hour.fetch_sub(1, Ordering::SeqCst);
            minute.fetch_sub(1, Ordering::SeqCst);
            return RateDecision::Limited;
        }

        RateDecision::Allowed {
            limit: self.per_minute,
            remaining: self.per_minute - minute_count,
        }
    }
}

/// Best-effort client address: socket peer, then the first `X-Forwarded-For` hop.
pub fn client_ip(extensions: &Extensions, headers: &HeaderMap) -> Option<String> {
    if let Some(ConnectInfo(addr)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip().to_string());
    }
    forwarded_for(headers)
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Middleware applying [`RateLimiter`] to every request except `/health`.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if path == "/health" {
        return next.run(req).await;
    }

    let ip = client_ip(req.extensions(), req.headers()).unwrap_or_else(|| "unknown".to_string());
    let key = format!("{}:{}", ip, path);

    match limiter.check(&key).await {
        RateDecision::Limited => {
            tracing::warn!("Rate limit exceeded for {}", key);
            AppError::TooManyRequests(RETRY_AFTER_SECS).into_response()
        }
        RateDecision::Allowed { limit, remaining } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_allows_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new(3, 100);
        for expected_remaining in [2, 1, 0] {
            assert_eq!(
                limiter.check("10.0.0.1:/api/v1/consumers").await,
                RateDecision::Allowed {
                    limit: 3,
                    remaining: expected_remaining
                }
            );
        }
        assert_eq!(
            limiter.check("10.0.0.1:/api/v1/consumers").await,
            RateDecision::Limited
        );
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, 100);
        assert!(matches!(
            limiter.check("10.0.0.1:/a").await,
            RateDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check("10.0.0.2:/a").await,
            RateDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check("10.0.0.1:/b").await,
            RateDecision::Allowed { .. }
        ));
        assert_eq!(limiter.check("10.0.0.1:/a").await, RateDecision::Limited);
    }

    #[tokio::test]
    async fn test_hour_window_applies() {
        let limiter = RateLimiter::new(10, 2);
        assert!(matches!(limiter.check("k").await, RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check("k").await, RateDecision::Allowed { .. }));
        assert_eq!(limiter.check("k").await, RateDecision::Limited);
    }

    #[tokio::test]
    async fn test_window_resets_after_expiry() {
        let limiter = RateLimiter::with_windows(
            1,
            100,
            Duration::from_millis(50),
            Duration::from_secs(3600),
        );
        assert!(matches!(limiter.check("k").await, RateDecision::Allowed { .. }));
        assert_eq!(limiter.check("k").await, RateDecision::Limited);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(matches!(limiter.check("k").await, RateDecision::Allowed { .. }));
    }

    fn app(limiter: RateLimiter) -> Router {
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/api/v1/ping", get(|| async { "pong" }))
            .layer(axum::middleware::from_fn_with_state(
                limiter,
                rate_limit_middleware,
            ))
    }

    fn request(path: &str) -> Request {
        Request::builder()
            .uri(path)
            .header("x-forwarded-for", "192.168.1.10, 10.0.0.1")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_middleware_sets_headers_and_throttles() {
        let app = app(RateLimiter::new(1, 100));

        let ok = app.clone().oneshot(request("/api/v1/ping")).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.headers()["x-ratelimit-limit"], "1");
        assert_eq!(ok.headers()["x-ratelimit-remaining"], "0");

        let limited = app.clone().oneshot(request("/api/v1/ping")).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(limited.headers()["retry-after"], "60");
    }

    #[tokio::test]
    async fn test_health_is_exempt() {
        let app = app(RateLimiter::new(1, 1));
        for _ in 0..3 {
            let response = app.clone().oneshot(request("/health")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(forwarded_for(&headers).as_deref(), Some("203.0.113.7"));
        assert_eq!(forwarded_for(&HeaderMap::new()), None);
    }
}
