//! Route definitions for the lending ledger API

mod auth;
mod loan;
mod pool;
mod proposal;

pub use auth::auth_routes;
pub use loan::loan_routes;
pub use pool::{account_routes, pool_routes};
pub use proposal::proposal_routes;

use axum::{routing::get, Router};

use crate::handlers::health_check;
use crate::middleware::{self, RateLimiter};
use crate::state::AppState;
use crate::websocket;

/// Full application router with request tracing and rate limiting.
/// CORS is layered on by the binary.
pub fn app_router(state: AppState, rate_limiter: RateLimiter) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ws", get(websocket::ws_handler))
        .merge(auth_routes())
        .merge(proposal_routes())
        .merge(loan_routes())
        .merge(pool_routes())
        .merge(account_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter,
            middleware::rate_limit,
        ))
}

async fn root() -> &'static str {
    "RateLend API Server"
}
