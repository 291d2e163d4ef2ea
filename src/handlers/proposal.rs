//! Proposal handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::error::ApiResult;
use crate::ledger::Ledger;
use crate::loan::LoanView;
use crate::middleware::Caller;
use crate::models::{ApiResponse, ValueRequest};
use crate::proposal::{CreateProposalRequest, ListProposalsQuery, LoanProposal};

/// Create a proposal as borrower. Rates left out are quoted from the oracle.
pub async fn create_proposal(
    State(ledger): State<Arc<Ledger>>,
    Caller(caller): Caller,
    Json(request): Json<CreateProposalRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<LoanProposal>>)> {
    request.validate()?;
    let proposal = ledger.create_proposal(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(proposal))))
}

pub async fn list_proposals(
    State(ledger): State<Arc<Ledger>>,
    Query(query): Query<ListProposalsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<LoanProposal>>>> {
    let proposals = if query.open {
        ledger.open_proposals().await
    } else {
        ledger.all_proposals().await
    };
    Ok(Json(ApiResponse::ok(proposals)))
}

pub async fn list_open_proposals(
    State(ledger): State<Arc<Ledger>>,
) -> ApiResult<Json<ApiResponse<Vec<LoanProposal>>>> {
    Ok(Json(ApiResponse::ok(ledger.open_proposals().await)))
}

pub async fn get_proposal(
    State(ledger): State<Arc<Ledger>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<ApiResponse<LoanProposal>>> {
    Ok(Json(ApiResponse::ok(ledger.proposal(id).await?)))
}

/// Accept a proposal as lender, sending exactly the loan amount
pub async fn accept_proposal(
    State(ledger): State<Arc<Ledger>>,
    Caller(caller): Caller,
    Path(id): Path<u64>,
    Json(request): Json<ValueRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<LoanView>>)> {
    let loan = ledger.accept_proposal(&caller, id, request.value).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(loan))))
}
