//! Pool and account route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn pool_routes() -> Router<AppState> {
    Router::new()
        .route("/api/pool", get(get_pool))
        .route("/api/pool/liquidity", post(add_liquidity))
        .route("/api/pool/liquidity/withdraw", post(remove_liquidity))
        .route("/api/pool/utilization", get(get_utilization))
        .route("/api/pool/floating-rate", get(get_floating_rate))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/api/accounts/:account/balance", get(get_balance))
        .route("/api/events", get(list_events))
}
