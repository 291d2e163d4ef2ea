//! JWT access tokens
//!
//! The `sub` claim names the ledger account a request acts for.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::AccountId;

pub const ACCESS_TOKEN_TYPE: &str = "access";

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Token expired")]
    TokenExpired,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub token_type: String,
}

/// Sign an access token for `account`, valid for `ttl_seconds`
pub fn issue_access_token(account: &AccountId, secret: &str, ttl_seconds: i64) -> Result<(String, Claims), JwtError> {
    let now = Utc::now();
    let claims = Claims {
        sub: account.to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_seconds)).timestamp(),
        token_type: ACCESS_TOKEN_TYPE.to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::EncodingFailed(e.to_string()))?;
    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            _ => JwtError::DecodingFailed(e.to_string()),
        })
}
