//! Health check

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    ledger_version: u64,
    ws_clients: usize,
    version: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        ledger_version: state.ledger.version().await,
        ws_clients: state.ws_state.client_count().await,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
