//! Per-client rate limiting

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, sync::Arc, time::Duration, time::Instant};
use tokio::sync::Mutex;

use crate::error::ApiError;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_take(&mut self, refill_per_sec: f64, capacity: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token buckets keyed by client; bursts up to twice the per-second rate
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, TokenBucket>>>,
    refill_per_sec: f64,
    capacity: f64,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        let rps = requests_per_second.max(1) as f64;
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            refill_per_sec: rps,
            capacity: rps * 2.0,
        }
    }

    pub async fn check(&self, client: &str) -> bool {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::full(self.capacity))
            .try_take(self.refill_per_sec, self.capacity)
    }

    /// Drop buckets idle for longer than `max_idle`
    pub async fn prune(&self, max_idle: Duration) {
        let now = Instant::now();
        self.buckets
            .lock()
            .await
            .retain(|_, bucket| now.duration_since(bucket.last_refill) < max_idle);
    }
}

/// Client key from proxy headers
pub(crate) fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware for `axum::middleware::from_fn_with_state`
pub async fn rate_limit(State(limiter): State<RateLimiter>, request: Request, next: Next) -> Response {
    let client = client_key(request.headers());
    if !limiter.check(&client).await {
        tracing::warn!(client = %client, "Rate limit exceeded");
        let mut response = ApiError::TooManyRequests.into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
        return response;
    }
    next.run(request).await
}
