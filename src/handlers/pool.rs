//! Liquidity pool handlers

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::error::ApiResult;
use crate::ledger::Ledger;
use crate::middleware::Caller;
use crate::models::{AmountRequest, ApiResponse};
use crate::pool::PoolStats;

#[derive(Debug, Serialize)]
pub struct UtilizationResponse {
    pub utilization_bps: u32,
}

#[derive(Debug, Serialize)]
pub struct FloatingRateResponse {
    pub floating_rate_bps: u32,
    pub utilization_bps: u32,
}

pub async fn add_liquidity(
    State(ledger): State<Arc<Ledger>>,
    Caller(caller): Caller,
    Json(request): Json<AmountRequest>,
) -> ApiResult<Json<ApiResponse<PoolStats>>> {
    Ok(Json(ApiResponse::ok(
        ledger.add_liquidity(&caller, request.amount).await?,
    )))
}

/// Withdraw from the caller's own deposit; credited to their balance
pub async fn remove_liquidity(
    State(ledger): State<Arc<Ledger>>,
    Caller(caller): Caller,
    Json(request): Json<AmountRequest>,
) -> ApiResult<Json<ApiResponse<PoolStats>>> {
    Ok(Json(ApiResponse::ok(
        ledger.remove_liquidity(&caller, request.amount).await?,
    )))
}

pub async fn get_pool(State(ledger): State<Arc<Ledger>>) -> ApiResult<Json<ApiResponse<PoolStats>>> {
    Ok(Json(ApiResponse::ok(ledger.pool_stats().await)))
}

pub async fn get_utilization(
    State(ledger): State<Arc<Ledger>>,
) -> ApiResult<Json<ApiResponse<UtilizationResponse>>> {
    Ok(Json(ApiResponse::ok(UtilizationResponse {
        utilization_bps: ledger.utilization_bps().await,
    })))
}

pub async fn get_floating_rate(
    State(ledger): State<Arc<Ledger>>,
) -> ApiResult<Json<ApiResponse<FloatingRateResponse>>> {
    let stats = ledger.pool_stats().await;
    Ok(Json(ApiResponse::ok(FloatingRateResponse {
        floating_rate_bps: stats.floating_rate_bps,
        utilization_bps: stats.utilization_bps,
    })))
}
