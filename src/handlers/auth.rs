//! Development token minting

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::auth::{issue_access_token, AuthConfig};
use crate::error::{ApiError, ApiResult};
use crate::models::{AccountId, ApiResponse};

#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(length(min = 1, max = 128))]
    pub account: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Mint an access token for any account. Disabled in production.
pub async fn issue_token(
    State(auth): State<Arc<AuthConfig>>,
    Json(request): Json<TokenRequest>,
) -> ApiResult<Json<ApiResponse<TokenResponse>>> {
    if !auth.dev_tokens_enabled {
        return Err(ApiError::NotFound("token minting is disabled".to_string()));
    }
    request.validate()?;

    let account = AccountId::new(request.account.trim());
    let (access_token, _) = issue_access_token(&account, &auth.jwt_secret, auth.access_token_ttl_seconds)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    tracing::info!(account = %account, "Issued development access token");
    Ok(Json(ApiResponse::ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: auth.access_token_ttl_seconds,
    })))
}
