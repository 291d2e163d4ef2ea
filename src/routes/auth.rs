//! Auth route definitions

use axum::{routing::post, Router};

use crate::handlers::issue_token;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/api/auth/token", post(issue_token))
}
