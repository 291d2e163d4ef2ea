//! Shared API models for the lending ledger

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monetary quantity in the smallest unit of the settlement asset
pub type Amount = u128;

/// Basis points denominator (100% = 10_000 bps)
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Account identifier (wallet address or any opaque caller id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Request body for payable operations (the value accompanying the call)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ValueRequest {
    pub value: Amount,
}

/// Request body for liquidity movements
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AmountRequest {
    pub amount: Amount,
}

/// Settlement balance of an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: AccountId,
    pub balance: Amount,
}
