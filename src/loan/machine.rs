//! Loan state machine transitions
//!
//! Each transition is a pure function of the current record: it checks every
//! guard first and returns the next record together with the payouts it
//! releases from custody. Nothing is mutated on failure.
//!
//! Guard order: state, caller role, deadline, value.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::models::{AccountId, Amount};

use super::model::{Loan, LoanState};

/// Why funds leave custody
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayoutReason {
    Principal,
    Repayment,
    CollateralReturn,
    Overpayment,
    CollateralSeized,
    LiquidityWithdrawal,
}

/// Credit to an account's settlement balance
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Payout {
    pub to: AccountId,
    pub amount: Amount,
    pub reason: PayoutReason,
}

/// Result of a successful transition
#[derive(Debug, Clone)]
pub struct Transition {
    pub loan: Loan,
    pub payouts: Vec<Payout>,
}

impl Transition {
    fn quiet(loan: Loan) -> Self {
        Self {
            loan,
            payouts: Vec::new(),
        }
    }
}

impl Loan {
    fn require_state(&self, expected: LoanState, action: &'static str) -> Result<(), LedgerError> {
        if self.state != expected {
            return Err(LedgerError::InvalidState {
                entity: "loan",
                id: self.id,
                state: self.state.to_string(),
                action,
            });
        }
        Ok(())
    }

    fn require_party(
        party: Option<&AccountId>,
        caller: &AccountId,
        action: &'static str,
    ) -> Result<(), LedgerError> {
        match party {
            Some(p) if p == caller => Ok(()),
            _ => Err(LedgerError::Unauthorized {
                caller: caller.clone(),
                action,
            }),
        }
    }

    /// Created → Funded. The caller becomes the lender.
    pub fn fund(&self, caller: &AccountId, value: Amount, now: i64) -> Result<Transition, LedgerError> {
        self.require_state(LoanState::Created, "fund loan")?;
        if value != self.terms.loan_amount {
            return Err(LedgerError::exact(self.terms.loan_amount, value));
        }

        let mut next = self.clone();
        next.state = LoanState::Funded;
        next.lender = Some(caller.clone());
        next.escrowed_principal = value;
        next.funded_at = Some(now);
        Ok(Transition::quiet(next))
    }

    /// Funded → Accepted. The caller posts exactly the collateral amount and
    /// becomes the borrower.
    pub fn accept_terms(
        &self,
        caller: &AccountId,
        value: Amount,
        now: i64,
    ) -> Result<Transition, LedgerError> {
        const ACTION: &str = "accept loan terms";
        self.require_state(LoanState::Funded, ACTION)?;
        if let Some(intended) = &self.intended_borrower {
            Self::require_party(Some(intended), caller, ACTION)?;
        }
        if self.lender.as_ref() == Some(caller) {
            return Err(LedgerError::Unauthorized {
                caller: caller.clone(),
                action: ACTION,
            });
        }
        if value != self.terms.collateral_amount {
            return Err(LedgerError::exact(self.terms.collateral_amount, value));
        }

        let mut next = self.clone();
        next.state = LoanState::Accepted;
        next.borrower = Some(caller.clone());
        next.escrowed_collateral = value;
        next.accepted_at = Some(now);
        Ok(Transition::quiet(next))
    }

    /// Accepted → Taken. Principal leaves custody to the borrower.
    pub fn take(&self, caller: &AccountId, now: i64) -> Result<Transition, LedgerError> {
        self.require_state(LoanState::Accepted, "take loan")?;
        Self::require_party(self.borrower.as_ref(), caller, "take loan")?;

        let mut next = self.clone();
        next.state = LoanState::Taken;
        next.taken_at = Some(now);
        let principal = std::mem::take(&mut next.escrowed_principal);
        Ok(Transition {
            loan: next,
            payouts: vec![Payout {
                to: caller.clone(),
                amount: principal,
                reason: PayoutReason::Principal,
            }],
        })
    }

    /// Taken → Taken with the other rate type. Allowed past the deadline
    /// until the loan is closed.
    pub fn switch_rate_type(&self, caller: &AccountId) -> Result<Transition, LedgerError> {
        self.require_state(LoanState::Taken, "switch rate type")?;
        Self::require_party(self.borrower.as_ref(), caller, "switch rate type")?;

        let mut next = self.clone();
        next.current_rate_type = self.current_rate_type.toggled();
        next.rate_switches = next.rate_switches.saturating_add(1);
        Ok(Transition::quiet(next))
    }

    /// Taken → Repaid. The lender receives principal, interest and fee; the
    /// borrower gets the collateral back plus any overpayment.
    pub fn repay(&self, caller: &AccountId, value: Amount, now: i64) -> Result<Transition, LedgerError> {
        self.require_state(LoanState::Taken, "repay")?;
        Self::require_party(self.borrower.as_ref(), caller, "repay")?;
        let due = self.total_due(now)?;
        if value < due {
            return Err(LedgerError::at_least(due, value));
        }
        let lender = self.lender.clone().ok_or(LedgerError::InvalidState {
            entity: "loan",
            id: self.id,
            state: "without lender".to_string(),
            action: "repay",
        })?;

        let mut next = self.clone();
        next.state = LoanState::Repaid;
        next.closed_at = Some(now);
        let collateral = std::mem::take(&mut next.escrowed_collateral);

        let mut payouts = vec![
            Payout {
                to: lender,
                amount: due,
                reason: PayoutReason::Repayment,
            },
            Payout {
                to: caller.clone(),
                amount: collateral,
                reason: PayoutReason::CollateralReturn,
            },
        ];
        if value > due {
            payouts.push(Payout {
                to: caller.clone(),
                amount: value - due,
                reason: PayoutReason::Overpayment,
            });
        }
        Ok(Transition {
            loan: next,
            payouts,
        })
    }

    /// Taken → Liquidated once the deadline has passed. Collateral goes to
    /// the lender.
    pub fn liquidate(&self, caller: &AccountId, now: i64) -> Result<Transition, LedgerError> {
        self.require_state(LoanState::Taken, "liquidate")?;
        Self::require_party(self.lender.as_ref(), caller, "liquidate")?;
        if now <= self.terms.repay_by_timestamp {
            return Err(LedgerError::DeadlineNotReached {
                deadline: self.terms.repay_by_timestamp,
                now,
            });
        }

        let mut next = self.clone();
        next.state = LoanState::Liquidated;
        next.closed_at = Some(now);
        let collateral = std::mem::take(&mut next.escrowed_collateral);
        Ok(Transition {
            loan: next,
            payouts: vec![Payout {
                to: caller.clone(),
                amount: collateral,
                reason: PayoutReason::CollateralSeized,
            }],
        })
    }
}
