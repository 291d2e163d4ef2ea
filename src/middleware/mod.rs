//! HTTP middleware: caller extraction, rate limiting and request tracing

pub mod auth;
mod rate_limiter;
mod tracing;

pub use auth::Caller;
pub use rate_limiter::{rate_limit, RateLimiter};
pub use tracing::{request_tracing, REQUEST_ID_HEADER};
