//! Loan lifecycle handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::ApiResult;
use crate::ledger::Ledger;
use crate::loan::{ListLoansQuery, LoanState, LoanView};
use crate::middleware::Caller;
use crate::models::{ApiResponse, ValueRequest};
use crate::proposal::CreateLoanRequest;

#[derive(Debug, Serialize)]
pub struct LoanStateResponse {
    pub loan_id: u64,
    pub state: LoanState,
    pub ordinal: u8,
}

type LoanResult = ApiResult<Json<ApiResponse<LoanView>>>;

/// Publish a lender offer in the Created state
pub async fn create_loan(
    State(ledger): State<Arc<Ledger>>,
    Caller(caller): Caller,
    Json(request): Json<CreateLoanRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<LoanView>>)> {
    request.validate()?;
    let loan = ledger.create_loan(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(loan))))
}

pub async fn list_loans(
    State(ledger): State<Arc<Ledger>>,
    Query(query): Query<ListLoansQuery>,
) -> ApiResult<Json<ApiResponse<Vec<LoanView>>>> {
    let loans = match (query.borrower, query.lender) {
        (Some(borrower), _) => ledger.loans_by_borrower(&borrower).await,
        (None, Some(lender)) => ledger.loans_by_lender(&lender).await,
        (None, None) => ledger.all_loans().await,
    };
    Ok(Json(ApiResponse::ok(loans)))
}

pub async fn list_overdue_loans(
    State(ledger): State<Arc<Ledger>>,
) -> ApiResult<Json<ApiResponse<Vec<LoanView>>>> {
    Ok(Json(ApiResponse::ok(ledger.overdue_loans().await)))
}

pub async fn get_loan(State(ledger): State<Arc<Ledger>>, Path(id): Path<u64>) -> LoanResult {
    Ok(Json(ApiResponse::ok(ledger.loan(id).await?)))
}

pub async fn get_loan_state(
    State(ledger): State<Arc<Ledger>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<ApiResponse<LoanStateResponse>>> {
    let state = ledger.loan_state(id).await?;
    Ok(Json(ApiResponse::ok(LoanStateResponse {
        loan_id: id,
        state,
        ordinal: state.ordinal(),
    })))
}

pub async fn fund_loan(
    State(ledger): State<Arc<Ledger>>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
    Json(request): Json<ValueRequest>,
) -> LoanResult {
    Ok(Json(ApiResponse::ok(
        ledger.fund_loan(&caller, id, request.value).await?,
    )))
}

/// Post collateral as borrower
pub async fn accept_loan_terms(
    State(ledger): State<Arc<Ledger>>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
    Json(request): Json<ValueRequest>,
) -> LoanResult {
    Ok(Json(ApiResponse::ok(
        ledger.accept_loan_terms(&caller, id, request.value).await?,
    )))
}

pub async fn take_loan(
    State(ledger): State<Arc<Ledger>>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
) -> LoanResult {
    Ok(Json(ApiResponse::ok(ledger.take_loan(&caller, id).await?)))
}

pub async fn switch_rate_type(
    State(ledger): State<Arc<Ledger>>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
) -> LoanResult {
    Ok(Json(ApiResponse::ok(
        ledger.switch_rate_type(&caller, id).await?,
    )))
}

pub async fn repay(
    State(ledger): State<Arc<Ledger>>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
    Json(request): Json<ValueRequest>,
) -> LoanResult {
    Ok(Json(ApiResponse::ok(
        ledger.repay(&caller, id, request.value).await?,
    )))
}

pub async fn liquidate(
    State(ledger): State<Arc<Ledger>>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
) -> LoanResult {
    Ok(Json(ApiResponse::ok(ledger.liquidate(&caller, id).await?)))
}
