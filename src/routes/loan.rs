//! Loan route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn loan_routes() -> Router<AppState> {
    Router::new()
        .route("/api/loans", post(create_loan).get(list_loans))
        .route("/api/loans/overdue", get(list_overdue_loans))
        .route("/api/loans/:id", get(get_loan))
        .route("/api/loans/:id/state", get(get_loan_state))
        .route("/api/loans/:id/fund", post(fund_loan))
        .route("/api/loans/:id/accept-terms", post(accept_loan_terms))
        .route("/api/loans/:id/take", post(take_loan))
        .route("/api/loans/:id/switch-rate", post(switch_rate_type))
        .route("/api/loans/:id/repay", post(repay))
        .route("/api/loans/:id/liquidate", post(liquidate))
}
