//! Caller extraction
//!
//! Resolves the account a request acts for from its bearer token.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;

use crate::auth::{verify_token, AuthConfig, JwtError, ACCESS_TOKEN_TYPE};
use crate::error::{ErrorDetails, ErrorResponse};
use crate::models::AccountId;

/// Account named by a valid access token
#[derive(Debug, Clone)]
pub struct Caller(pub AccountId);

fn reject(code: &str, message: &str) -> Response {
    let body = ErrorResponse {
        error: ErrorDetails {
            code: code.to_string(),
            message: message.to_string(),
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    Arc<AuthConfig>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| reject("MISSING_TOKEN", "Authorization header with Bearer token required"))?;

        let auth = Arc::<AuthConfig>::from_ref(state);
        let claims = verify_token(bearer.token(), &auth.jwt_secret).map_err(|e| match e {
            JwtError::TokenExpired => reject("TOKEN_EXPIRED", "Token has expired"),
            _ => reject("INVALID_TOKEN", "Invalid token"),
        })?;

        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(reject("INVALID_TOKEN_TYPE", "Expected access token"));
        }
        if claims.sub.trim().is_empty() {
            return Err(reject("INVALID_TOKEN", "Token does not name an account"));
        }

        Ok(Caller(AccountId::new(claims.sub)))
    }
}
