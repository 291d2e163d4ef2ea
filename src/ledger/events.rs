//! Ledger events and push notifications

use serde::Serialize;

use crate::loan::{PayoutReason, RateType};
use crate::models::{AccountId, Amount};

/// Committed ledger event. `seq` is the position in the event log,
/// starting at 1.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LedgerEvent {
    pub seq: u64,
    pub version: u64,
    pub timestamp: i64,
    #[serde(flatten)]
    pub kind: LedgerEventKind,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEventKind {
    ProposalCreated {
        proposal_id: u64,
        borrower: AccountId,
        loan_amount: Amount,
        oracle: String,
    },
    ProposalAccepted {
        proposal_id: u64,
        lender: AccountId,
        loan_id: u64,
    },
    LoanCreated {
        loan_id: u64,
        creator: AccountId,
    },
    LoanFunded {
        loan_id: u64,
        lender: AccountId,
        amount: Amount,
    },
    LoanTermsAccepted {
        loan_id: u64,
        borrower: AccountId,
        collateral: Amount,
    },
    LoanTaken {
        loan_id: u64,
        borrower: AccountId,
        amount: Amount,
    },
    RateTypeSwitched {
        loan_id: u64,
        rate_type: RateType,
    },
    LoanRepaid {
        loan_id: u64,
        borrower: AccountId,
        amount: Amount,
    },
    LoanLiquidated {
        loan_id: u64,
        lender: AccountId,
        collateral: Amount,
    },
    LiquidityAdded {
        provider: AccountId,
        amount: Amount,
        total_liquidity: Amount,
    },
    LiquidityRemoved {
        provider: AccountId,
        amount: Amount,
        total_liquidity: Amount,
    },
    /// Settlement balance credit
    FundsReleased {
        loan_id: Option<u64>,
        to: AccountId,
        amount: Amount,
        reason: PayoutReason,
    },
}

impl LedgerEventKind {
    pub fn loan_id(&self) -> Option<u64> {
        match self {
            LedgerEventKind::ProposalAccepted { loan_id, .. }
            | LedgerEventKind::LoanCreated { loan_id, .. }
            | LedgerEventKind::LoanFunded { loan_id, .. }
            | LedgerEventKind::LoanTermsAccepted { loan_id, .. }
            | LedgerEventKind::LoanTaken { loan_id, .. }
            | LedgerEventKind::RateTypeSwitched { loan_id, .. }
            | LedgerEventKind::LoanRepaid { loan_id, .. }
            | LedgerEventKind::LoanLiquidated { loan_id, .. } => Some(*loan_id),
            LedgerEventKind::FundsReleased { loan_id, .. } => *loan_id,
            _ => None,
        }
    }
}

/// Message pushed to live subscribers
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Notification {
    Ledger(LedgerEvent),
    LoanOverdue {
        loan_id: u64,
        borrower: Option<AccountId>,
        lender: Option<AccountId>,
        repay_by_timestamp: i64,
        detected_at: i64,
    },
}

impl Notification {
    pub fn loan_id(&self) -> Option<u64> {
        match self {
            Notification::Ledger(event) => event.kind.loan_id(),
            Notification::LoanOverdue { loan_id, .. } => Some(*loan_id),
        }
    }
}
