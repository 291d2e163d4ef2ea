//! Liquidity pool accounting

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::LedgerError;
use crate::models::{AccountId, Amount, BPS_DENOMINATOR};

/// Pool balance, principal currently lent out and per-provider deposits
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LiquidityPool {
    pub total_liquidity: Amount,
    /// Principal of loans currently taken
    pub total_lent: Amount,
    pub deposits: BTreeMap<AccountId, Amount>,
}

impl LiquidityPool {
    /// Utilization in basis points, capped at 100%; zero for an empty pool
    pub fn utilization_bps(&self) -> u32 {
        if self.total_liquidity == 0 {
            return 0;
        }
        let utilization = self
            .total_lent
            .saturating_mul(BPS_DENOMINATOR as u128)
            / self.total_liquidity;
        utilization.min(BPS_DENOMINATOR as u128) as u32
    }

    pub fn deposit_of(&self, provider: &AccountId) -> Amount {
        self.deposits.get(provider).copied().unwrap_or(0)
    }

    pub fn with_deposit(&self, provider: &AccountId, amount: Amount) -> Result<Self, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount {
                expected: "amount greater than 0".to_string(),
                actual: 0,
            });
        }
        let mut next = self.clone();
        next.total_liquidity = next
            .total_liquidity
            .checked_add(amount)
            .ok_or(LedgerError::MathOverflow)?;
        let held = next.deposits.entry(provider.clone()).or_insert(0);
        *held = held.checked_add(amount).ok_or(LedgerError::MathOverflow)?;
        Ok(next)
    }

    /// Withdraw from the pool; bounded by both the pool balance and the
    /// provider's own deposit.
    pub fn with_withdrawal(&self, provider: &AccountId, amount: Amount) -> Result<Self, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount {
                expected: "amount greater than 0".to_string(),
                actual: 0,
            });
        }
        if amount > self.total_liquidity {
            return Err(LedgerError::InsufficientLiquidity {
                requested: amount,
                available: self.total_liquidity,
            });
        }
        let deposited = self.deposit_of(provider);
        if amount > deposited {
            return Err(LedgerError::InsufficientLiquidity {
                requested: amount,
                available: deposited,
            });
        }

        let mut next = self.clone();
        next.total_liquidity -= amount;
        if deposited == amount {
            next.deposits.remove(provider);
        } else {
            next.deposits.insert(provider.clone(), deposited - amount);
        }
        Ok(next)
    }

    pub fn with_draw(&self, principal: Amount) -> Result<Self, LedgerError> {
        let mut next = self.clone();
        next.total_lent = next
            .total_lent
            .checked_add(principal)
            .ok_or(LedgerError::MathOverflow)?;
        Ok(next)
    }

    pub fn with_settlement(&self, principal: Amount) -> Self {
        let mut next = self.clone();
        next.total_lent = next.total_lent.saturating_sub(principal);
        next
    }
}

/// Pool figures returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub total_liquidity: Amount,
    pub total_lent: Amount,
    pub utilization_bps: u32,
    pub floating_rate_bps: u32,
    pub providers: usize,
}
