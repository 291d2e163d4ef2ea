//! Loan models

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LedgerError;
use crate::models::{AccountId, Amount};

use super::interest;

/// Loan lifecycle state. The discriminant is the ordinal used for the
/// monotonicity invariant; Repaid and Liquidated are terminal siblings.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoanState {
    Created = 0,
    Funded = 1,
    Accepted = 2,
    Taken = 3,
    Repaid = 4,
    Liquidated = 5,
}

impl LoanState {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LoanState::Repaid | LoanState::Liquidated)
    }
}

impl fmt::Display for LoanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoanState::Created => "created",
            LoanState::Funded => "funded",
            LoanState::Accepted => "accepted",
            LoanState::Taken => "taken",
            LoanState::Repaid => "repaid",
            LoanState::Liquidated => "liquidated",
        };
        f.write_str(s)
    }
}

/// Which of the two quoted rates currently applies
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RateType {
    Fixed,
    Floating,
}

impl RateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateType::Fixed => "fixed",
            RateType::Floating => "floating",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            RateType::Fixed => RateType::Floating,
            RateType::Floating => RateType::Fixed,
        }
    }
}

/// Interest accrual strategy, fixed at creation
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterestCalculationType {
    #[default]
    SimpleApr,
    CompoundApy,
}

/// Economic terms shared by proposals and loans
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LoanTerms {
    pub loan_amount: Amount,
    pub fee_amount: Amount,
    pub collateral_amount: Amount,
    /// Unix seconds
    pub repay_by_timestamp: i64,
    pub fixed_rate_bps: u32,
    pub floating_rate_bps: u32,
    #[serde(default)]
    pub interest_calculation_type: InterestCalculationType,
}

impl LoanTerms {
    /// Terms must have a positive principal and collateral and a deadline
    /// strictly after `now`. A zero fee is allowed.
    pub fn check(&self, now: i64) -> Result<(), LedgerError> {
        if self.loan_amount == 0 {
            return Err(LedgerError::InvalidAmount {
                expected: "loan amount greater than 0".to_string(),
                actual: 0,
            });
        }
        if self.collateral_amount == 0 {
            return Err(LedgerError::InvalidAmount {
                expected: "collateral amount greater than 0".to_string(),
                actual: 0,
            });
        }
        if self.repay_by_timestamp <= now {
            return Err(LedgerError::DeadlinePassed {
                deadline: self.repay_by_timestamp,
                now,
            });
        }
        Ok(())
    }
}

/// Loan record as held by the ledger
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Loan {
    pub id: u64,
    pub proposal_id: Option<u64>,
    pub state: LoanState,
    pub creator: AccountId,
    pub lender: Option<AccountId>,
    pub borrower: Option<AccountId>,
    /// Only this account may post collateral, when set
    pub intended_borrower: Option<AccountId>,
    pub terms: LoanTerms,
    pub current_rate_type: RateType,
    pub rate_switches: u32,
    /// Lender funds held in custody until the loan is taken
    pub escrowed_principal: Amount,
    /// Borrower collateral held in custody until repay or liquidate
    pub escrowed_collateral: Amount,
    pub created_at: i64,
    pub funded_at: Option<i64>,
    pub accepted_at: Option<i64>,
    pub taken_at: Option<i64>,
    pub closed_at: Option<i64>,
}

impl Loan {
    /// Rate in basis points selected by the current rate type
    pub fn current_rate_bps(&self) -> u32 {
        match self.current_rate_type {
            RateType::Fixed => self.terms.fixed_rate_bps,
            RateType::Floating => self.terms.floating_rate_bps,
        }
    }

    /// Seconds of accrual at `now`: zero until taken, frozen once closed
    pub fn elapsed_secs(&self, now: i64) -> u64 {
        match self.taken_at {
            Some(taken_at) => {
                let end = self.closed_at.unwrap_or(now);
                end.saturating_sub(taken_at).max(0) as u64
            }
            None => 0,
        }
    }

    /// Interest accrued at `now` under the current rate type
    pub fn interest(&self, now: i64) -> Result<Amount, LedgerError> {
        interest::accrue(
            self.terms.interest_calculation_type,
            self.terms.loan_amount,
            self.current_rate_bps(),
            self.elapsed_secs(now),
        )
    }

    /// Minimum value that closes the loan at `now`
    pub fn total_due(&self, now: i64) -> Result<Amount, LedgerError> {
        self.terms
            .loan_amount
            .checked_add(self.interest(now)?)
            .and_then(|v| v.checked_add(self.terms.fee_amount))
            .ok_or(LedgerError::MathOverflow)
    }

    pub fn is_overdue(&self, now: i64) -> bool {
        self.state == LoanState::Taken && now > self.terms.repay_by_timestamp
    }

    /// Client-facing snapshot with derived figures computed at `now`
    pub fn view(&self, now: i64) -> LoanView {
        let interest = self.interest(now).ok();
        let total_due = self.total_due(now).ok();
        LoanView {
            id: self.id,
            proposal_id: self.proposal_id,
            state: self.state,
            lender: self.lender.clone(),
            borrower: self.borrower.clone(),
            loan_amount: self.terms.loan_amount,
            fee_amount: self.terms.fee_amount,
            collateral_amount: self.terms.collateral_amount,
            repay_by_timestamp: self.terms.repay_by_timestamp,
            fixed_rate_bps: self.terms.fixed_rate_bps,
            floating_rate_bps: self.terms.floating_rate_bps,
            current_rate_type: self.current_rate_type,
            interest_calculation_type: self.terms.interest_calculation_type,
            interest,
            total_due,
            escrowed_collateral: self.escrowed_collateral,
            overdue: self.is_overdue(now),
            created_at: self.created_at,
            taken_at: self.taken_at,
            closed_at: self.closed_at,
        }
    }
}

/// Read model returned to clients
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoanView {
    pub id: u64,
    pub proposal_id: Option<u64>,
    pub state: LoanState,
    pub lender: Option<AccountId>,
    pub borrower: Option<AccountId>,
    pub loan_amount: Amount,
    pub fee_amount: Amount,
    pub collateral_amount: Amount,
    pub repay_by_timestamp: i64,
    pub fixed_rate_bps: u32,
    pub floating_rate_bps: u32,
    pub current_rate_type: RateType,
    pub interest_calculation_type: InterestCalculationType,
    /// `None` when accrual overflows
    pub interest: Option<Amount>,
    pub total_due: Option<Amount>,
    pub escrowed_collateral: Amount,
    pub overdue: bool,
    pub created_at: i64,
    pub taken_at: Option<i64>,
    pub closed_at: Option<i64>,
}

/// Query for listing loans
#[derive(Debug, Deserialize)]
pub struct ListLoansQuery {
    pub borrower: Option<AccountId>,
    pub lender: Option<AccountId>,
}
