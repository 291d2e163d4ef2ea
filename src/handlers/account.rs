//! Account balances and the event feed

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ApiResult;
use crate::ledger::{Ledger, LedgerEvent};
use crate::models::{AccountBalance, AccountId, ApiResponse};

const DEFAULT_EVENT_LIMIT: usize = 100;
const MAX_EVENT_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Return events with a sequence number above this
    #[serde(default)]
    pub since: u64,
    pub limit: Option<usize>,
}

pub async fn get_balance(
    State(ledger): State<Arc<Ledger>>,
    Path(account): Path<String>,
) -> ApiResult<Json<ApiResponse<AccountBalance>>> {
    let account = AccountId::new(account);
    let balance = ledger.balance(&account).await;
    Ok(Json(ApiResponse::ok(AccountBalance { account, balance })))
}

pub async fn list_events(
    State(ledger): State<Arc<Ledger>>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<LedgerEvent>>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(1, MAX_EVENT_LIMIT);
    Ok(Json(ApiResponse::ok(
        ledger.events_since(query.since, limit).await,
    )))
}
