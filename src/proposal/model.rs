//! Proposal models

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::loan::{InterestCalculationType, LoanTerms};
use crate::models::{AccountId, Amount, BPS_DENOMINATOR};

/// Oracle reference recorded when the caller supplied both rates
pub const MANUAL_RATE_SOURCE: &str = "manual";

/// Borrower-submitted terms awaiting a lender
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LoanProposal {
    pub id: u64,
    pub borrower: AccountId,
    pub terms: LoanTerms,
    /// Feed the rates were quoted from
    pub oracle: String,
    pub accepted: bool,
    pub accepted_lender: Option<AccountId>,
    pub accepted_loan_id: Option<u64>,
    pub creation_timestamp: i64,
}

impl LoanProposal {
    pub fn is_open(&self) -> bool {
        !self.accepted
    }
}

/// Request DTO for creating a proposal. Rates left out are quoted from the
/// rate oracle at creation time.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateProposalRequest {
    pub loan_amount: Amount,
    #[serde(default)]
    pub fee_amount: Amount,
    pub collateral_amount: Amount,
    pub repay_by_timestamp: i64,
    #[validate(range(max = 10000))]
    pub fixed_rate_bps: Option<u32>,
    #[validate(range(max = 10000))]
    pub floating_rate_bps: Option<u32>,
    #[serde(default)]
    pub interest_calculation_type: InterestCalculationType,
}

impl CreateProposalRequest {
    /// Both rates supplied, so the oracle need not be consulted
    pub fn has_explicit_rates(&self) -> bool {
        self.fixed_rate_bps.is_some() && self.floating_rate_bps.is_some()
    }

    /// Resolve into concrete terms, filling missing rates from `quote`
    pub fn into_terms(self, quote: Option<RateQuote>) -> LoanTerms {
        let (fixed, floating) = match quote {
            Some(q) => (
                self.fixed_rate_bps.unwrap_or(q.fixed_rate_bps),
                self.floating_rate_bps.unwrap_or(q.floating_rate_bps),
            ),
            None => (
                self.fixed_rate_bps.unwrap_or_default(),
                self.floating_rate_bps.unwrap_or_default(),
            ),
        };
        LoanTerms {
            loan_amount: self.loan_amount,
            fee_amount: self.fee_amount,
            collateral_amount: self.collateral_amount,
            repay_by_timestamp: self.repay_by_timestamp,
            fixed_rate_bps: fixed.min(BPS_DENOMINATOR),
            floating_rate_bps: floating.min(BPS_DENOMINATOR),
            interest_calculation_type: self.interest_calculation_type,
        }
    }
}

/// Lender offers carry the same terms as proposals
pub type CreateLoanRequest = CreateProposalRequest;

/// Fixed and floating rates quoted at a point in time
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RateQuote {
    pub fixed_rate_bps: u32,
    pub floating_rate_bps: u32,
    /// Oracle the reference rate came from
    pub source: String,
    pub round_id: u64,
}

/// Query for listing proposals
#[derive(Debug, Deserialize)]
pub struct ListProposalsQuery {
    #[serde(default)]
    pub open: bool,
}
