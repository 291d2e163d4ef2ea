//! Proposal route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn proposal_routes() -> Router<AppState> {
    Router::new()
        .route("/api/proposals", post(create_proposal).get(list_proposals))
        .route("/api/proposals/open", get(list_open_proposals))
        .route("/api/proposals/:id", get(get_proposal))
        .route("/api/proposals/:id/accept", post(accept_proposal))
}
