//! Caller authentication
//!
//! Every state-changing request names its caller through a bearer JWT.
//! Token minting over HTTP exists for development only.

mod jwt;

pub use jwt::{issue_access_token, verify_token, Claims, JwtError, ACCESS_TOKEN_TYPE};

/// Token settings shared with the extractor and the dev token route
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_ttl_seconds: i64,
    /// Allow `POST /api/auth/token`
    pub dev_tokens_enabled: bool,
}
