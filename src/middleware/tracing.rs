//! Request tracing middleware

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

use super::rate_limiter::client_key;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Log method, path, status and latency of every request, tagged with a
/// request id that is echoed back to the client
pub async fn request_tracing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = client_key(request.headers());
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let start = Instant::now();
    tracing::debug!(%method, %path, %client, %request_id, "Request started");

    let mut response = next.run(request).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        tracing::error!(%method, %path, status, duration_ms, %request_id, "Request failed");
    } else if response.status().is_client_error() {
        tracing::warn!(%method, %path, status, duration_ms, %request_id, "Request rejected");
    } else {
        tracing::info!(%method, %path, status, duration_ms, %request_id, "Request completed");
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
