//! Centralized error handling for the lending ledger
//!
//! `LedgerError` is the domain taxonomy every state-changing operation fails
//! with; `ApiError` maps it (and transport-level failures) onto HTTP status
//! codes and JSON error bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::{AccountId, Amount};

/// Domain errors raised by the ledger. Any of these aborts the whole
/// transaction with no state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("account {caller} is not allowed to {action}")]
    Unauthorized { caller: AccountId, action: &'static str },

    #[error("invalid amount: expected {expected}, got {actual}")]
    InvalidAmount { expected: String, actual: Amount },

    #[error("{entity} {id} is {state}, cannot {action}")]
    InvalidState {
        entity: &'static str,
        id: u64,
        state: String,
        action: &'static str,
    },

    #[error("deadline {deadline} not reached (now {now})")]
    DeadlineNotReached { deadline: i64, now: i64 },

    #[error("deadline {deadline} already passed (now {now})")]
    DeadlinePassed { deadline: i64, now: i64 },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("proposal {0} already accepted")]
    AlreadyAccepted(u64),

    #[error("insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: Amount, available: Amount },

    #[error("arithmetic overflow")]
    MathOverflow,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("rate oracle error: {0}")]
    Oracle(String),
}

impl LedgerError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Unauthorized { .. } => "UNAUTHORIZED_CALLER",
            LedgerError::InvalidAmount { .. } => "INVALID_AMOUNT",
            LedgerError::InvalidState { .. } => "INVALID_STATE",
            LedgerError::DeadlineNotReached { .. } => "DEADLINE_NOT_REACHED",
            LedgerError::DeadlinePassed { .. } => "DEADLINE_PASSED",
            LedgerError::NotFound { .. } => "NOT_FOUND",
            LedgerError::AlreadyAccepted(_) => "ALREADY_ACCEPTED",
            LedgerError::InsufficientLiquidity { .. } => "INSUFFICIENT_LIQUIDITY",
            LedgerError::MathOverflow => "MATH_OVERFLOW",
            LedgerError::Storage(_) => "STORAGE_ERROR",
            LedgerError::Oracle(_) => "ORACLE_ERROR",
        }
    }

    pub(crate) fn exact(expected: Amount, actual: Amount) -> Self {
        LedgerError::InvalidAmount {
            expected: format!("exactly {}", expected),
            actual,
        }
    }

    pub(crate) fn at_least(expected: Amount, actual: Amount) -> Self {
        LedgerError::InvalidAmount {
            expected: format!("at least {}", expected),
            actual,
        }
    }
}

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Ledger(e) => e.code(),
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::TooManyRequests => "TOO_MANY_REQUESTS",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Ledger(e) => match e {
                LedgerError::Unauthorized { .. } => StatusCode::FORBIDDEN,
                LedgerError::InvalidState { .. } | LedgerError::AlreadyAccepted(_) => {
                    StatusCode::CONFLICT
                }
                LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
                LedgerError::InvalidAmount { .. }
                | LedgerError::DeadlineNotReached { .. }
                | LedgerError::DeadlinePassed { .. }
                | LedgerError::InsufficientLiquidity { .. }
                | LedgerError::MathOverflow => StatusCode::UNPROCESSABLE_ENTITY,
                LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                LedgerError::Oracle(_) => StatusCode::BAD_GATEWAY,
            },
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, code = %error_code, "Server error occurred");
        } else {
            tracing::debug!(error = %message, code = %error_code, "Client error occurred");
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

/// Result type alias using ApiError
pub type ApiResult<T> = Result<T, ApiError>;
