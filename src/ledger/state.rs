//! Versioned ledger state
//!
//! A transaction is applied in two steps. `plan` validates it against the
//! current state and returns the complete write set without touching
//! anything; `commit` applies a planned write set and cannot fail. Any
//! guard violation therefore leaves the state exactly as it was.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::LedgerError;
use crate::loan::{Loan, LoanState, LoanTerms, Payout, PayoutReason, RateType, Transition};
use crate::models::{AccountId, Amount};
use crate::pool::LiquidityPool;
use crate::proposal::{LoanProposal, ProposalRegistry};

use super::events::{LedgerEvent, LedgerEventKind};

/// State-changing request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    CreateProposal { terms: LoanTerms, oracle: String },
    AcceptProposal { proposal_id: u64, value: Amount },
    CreateLoan { terms: LoanTerms },
    FundLoan { loan_id: u64, value: Amount },
    AcceptLoanTerms { loan_id: u64, value: Amount },
    TakeLoan { loan_id: u64 },
    SwitchRateType { loan_id: u64 },
    Repay { loan_id: u64, value: Amount },
    Liquidate { loan_id: u64 },
    AddLiquidity { amount: Amount },
    RemoveLiquidity { amount: Amount },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::CreateProposal { .. } => "create_proposal",
            Command::AcceptProposal { .. } => "accept_proposal",
            Command::CreateLoan { .. } => "create_loan",
            Command::FundLoan { .. } => "fund_loan",
            Command::AcceptLoanTerms { .. } => "accept_loan_terms",
            Command::TakeLoan { .. } => "take_loan",
            Command::SwitchRateType { .. } => "switch_rate_type",
            Command::Repay { .. } => "repay",
            Command::Liquidate { .. } => "liquidate",
            Command::AddLiquidity { .. } => "add_liquidity",
            Command::RemoveLiquidity { .. } => "remove_liquidity",
        }
    }
}

/// A command bound to its caller, ledger time and version. This is the
/// unit written to the write-ahead log and replayed on start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub version: u64,
    pub caller: AccountId,
    pub timestamp: i64,
    pub command: Command,
}

/// Everything a transaction changes
#[derive(Debug, Default)]
pub struct WriteSet {
    proposal: Option<LoanProposal>,
    loan: Option<Loan>,
    borrower_index: Option<(AccountId, u64)>,
    lender_index: Option<(AccountId, u64)>,
    pool: Option<LiquidityPool>,
    credits: Vec<(Option<u64>, Payout)>,
    events: Vec<LedgerEventKind>,
}

impl WriteSet {
    fn with_transition(mut self, transition: Transition) -> Self {
        let loan_id = transition.loan.id;
        self.credits
            .extend(transition.payouts.into_iter().map(|p| (Some(loan_id), p)));
        self.loan = Some(transition.loan);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerState {
    pub version: u64,
    pub proposals: ProposalRegistry,
    pub loans: BTreeMap<u64, Loan>,
    pub loans_by_borrower: BTreeMap<AccountId, Vec<u64>>,
    pub loans_by_lender: BTreeMap<AccountId, Vec<u64>>,
    pub pool: LiquidityPool,
    pub balances: BTreeMap<AccountId, Amount>,
    #[serde(skip)]
    pub events: Vec<LedgerEvent>,
}

impl LedgerState {
    pub fn next_loan_id(&self) -> u64 {
        self.loans.len() as u64 + 1
    }

    pub fn require_loan(&self, id: u64) -> Result<&Loan, LedgerError> {
        self.loans
            .get(&id)
            .ok_or(LedgerError::NotFound { entity: "loan", id })
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Validate `tx` and compute its write set. Read-only.
    pub fn plan(&self, tx: &Transaction) -> Result<WriteSet, LedgerError> {
        let writes = self.plan_command(tx)?;
        self.check_credits(&writes.credits)?;
        Ok(writes)
    }

    /// Every payout must fit its recipient's balance, counting several
    /// payouts to the same account together
    fn check_credits(&self, credits: &[(Option<u64>, Payout)]) -> Result<(), LedgerError> {
        let mut projected: BTreeMap<&AccountId, Amount> = BTreeMap::new();
        for (_, payout) in credits {
            let balance = match projected.get(&payout.to) {
                Some(balance) => *balance,
                None => self.balance_of(&payout.to),
            };
            let next = balance
                .checked_add(payout.amount)
                .ok_or(LedgerError::MathOverflow)?;
            projected.insert(&payout.to, next);
        }
        Ok(())
    }

    fn plan_command(&self, tx: &Transaction) -> Result<WriteSet, LedgerError> {
        let caller = &tx.caller;
        let now = tx.timestamp;

        match &tx.command {
            Command::CreateProposal { terms, oracle } => {
                let proposal = self.proposals.draft(caller, terms.clone(), oracle.clone(), now)?;
                Ok(WriteSet {
                    events: vec![LedgerEventKind::ProposalCreated {
                        proposal_id: proposal.id,
                        borrower: caller.clone(),
                        loan_amount: proposal.terms.loan_amount,
                        oracle: proposal.oracle.clone(),
                    }],
                    proposal: Some(proposal),
                    ..Default::default()
                })
            }

            Command::AcceptProposal { proposal_id, value } => {
                let loan_id = self.next_loan_id();
                let proposal = self
                    .proposals
                    .draft_acceptance(*proposal_id, caller, *value, loan_id, now)?;
                let loan = Loan {
                    id: loan_id,
                    proposal_id: Some(proposal.id),
                    state: LoanState::Funded,
                    creator: proposal.borrower.clone(),
                    lender: Some(caller.clone()),
                    borrower: None,
                    intended_borrower: Some(proposal.borrower.clone()),
                    terms: proposal.terms.clone(),
                    current_rate_type: RateType::Fixed,
                    rate_switches: 0,
                    escrowed_principal: *value,
                    escrowed_collateral: 0,
                    created_at: now,
                    funded_at: Some(now),
                    accepted_at: None,
                    taken_at: None,
                    closed_at: None,
                };
                Ok(WriteSet {
                    events: vec![
                        LedgerEventKind::ProposalAccepted {
                            proposal_id: proposal.id,
                            lender: caller.clone(),
                            loan_id,
                        },
                        LedgerEventKind::LoanFunded {
                            loan_id,
                            lender: caller.clone(),
                            amount: *value,
                        },
                    ],
                    proposal: Some(proposal),
                    loan: Some(loan),
                    lender_index: Some((caller.clone(), loan_id)),
                    ..Default::default()
                })
            }

            Command::CreateLoan { terms } => {
                terms.check(now)?;
                let loan_id = self.next_loan_id();
                let loan = Loan {
                    id: loan_id,
                    proposal_id: None,
                    state: LoanState::Created,
                    creator: caller.clone(),
                    lender: None,
                    borrower: None,
                    intended_borrower: None,
                    terms: terms.clone(),
                    current_rate_type: RateType::Fixed,
                    rate_switches: 0,
                    escrowed_principal: 0,
                    escrowed_collateral: 0,
                    created_at: now,
                    funded_at: None,
                    accepted_at: None,
                    taken_at: None,
                    closed_at: None,
                };
                Ok(WriteSet {
                    loan: Some(loan),
                    events: vec![LedgerEventKind::LoanCreated {
                        loan_id,
                        creator: caller.clone(),
                    }],
                    ..Default::default()
                })
            }

            Command::FundLoan { loan_id, value } => {
                let transition = self.require_loan(*loan_id)?.fund(caller, *value, now)?;
                Ok(WriteSet {
                    lender_index: Some((caller.clone(), *loan_id)),
                    events: vec![LedgerEventKind::LoanFunded {
                        loan_id: *loan_id,
                        lender: caller.clone(),
                        amount: *value,
                    }],
                    ..Default::default()
                }
                .with_transition(transition))
            }

            Command::AcceptLoanTerms { loan_id, value } => {
                let transition = self
                    .require_loan(*loan_id)?
                    .accept_terms(caller, *value, now)?;
                Ok(WriteSet {
                    borrower_index: Some((caller.clone(), *loan_id)),
                    events: vec![LedgerEventKind::LoanTermsAccepted {
                        loan_id: *loan_id,
                        borrower: caller.clone(),
                        collateral: *value,
                    }],
                    ..Default::default()
                }
                .with_transition(transition))
            }

            Command::TakeLoan { loan_id } => {
                let loan = self.require_loan(*loan_id)?;
                let transition = loan.take(caller, now)?;
                let pool = self.pool.with_draw(loan.terms.loan_amount)?;
                Ok(WriteSet {
                    pool: Some(pool),
                    events: vec![LedgerEventKind::LoanTaken {
                        loan_id: *loan_id,
                        borrower: caller.clone(),
                        amount: loan.terms.loan_amount,
                    }],
                    ..Default::default()
                }
                .with_transition(transition))
            }

            Command::SwitchRateType { loan_id } => {
                let transition = self.require_loan(*loan_id)?.switch_rate_type(caller)?;
                Ok(WriteSet {
                    events: vec![LedgerEventKind::RateTypeSwitched {
                        loan_id: *loan_id,
                        rate_type: transition.loan.current_rate_type,
                    }],
                    ..Default::default()
                }
                .with_transition(transition))
            }

            Command::Repay { loan_id, value } => {
                let loan = self.require_loan(*loan_id)?;
                let transition = loan.repay(caller, *value, now)?;
                let pool = self.pool.with_settlement(loan.terms.loan_amount);
                Ok(WriteSet {
                    pool: Some(pool),
                    events: vec![LedgerEventKind::LoanRepaid {
                        loan_id: *loan_id,
                        borrower: caller.clone(),
                        amount: *value,
                    }],
                    ..Default::default()
                }
                .with_transition(transition))
            }

            Command::Liquidate { loan_id } => {
                let loan = self.require_loan(*loan_id)?;
                let transition = loan.liquidate(caller, now)?;
                let pool = self.pool.with_settlement(loan.terms.loan_amount);
                Ok(WriteSet {
                    pool: Some(pool),
                    events: vec![LedgerEventKind::LoanLiquidated {
                        loan_id: *loan_id,
                        lender: caller.clone(),
                        collateral: loan.escrowed_collateral,
                    }],
                    ..Default::default()
                }
                .with_transition(transition))
            }

            Command::AddLiquidity { amount } => {
                let pool = self.pool.with_deposit(caller, *amount)?;
                Ok(WriteSet {
                    events: vec![LedgerEventKind::LiquidityAdded {
                        provider: caller.clone(),
                        amount: *amount,
                        total_liquidity: pool.total_liquidity,
                    }],
                    pool: Some(pool),
                    ..Default::default()
                })
            }

            Command::RemoveLiquidity { amount } => {
                let pool = self.pool.with_withdrawal(caller, *amount)?;
                Ok(WriteSet {
                    events: vec![LedgerEventKind::LiquidityRemoved {
                        provider: caller.clone(),
                        amount: *amount,
                        total_liquidity: pool.total_liquidity,
                    }],
                    pool: Some(pool),
                    credits: vec![(
                        None,
                        Payout {
                            to: caller.clone(),
                            amount: *amount,
                            reason: PayoutReason::LiquidityWithdrawal,
                        },
                    )],
                    ..Default::default()
                })
            }
        }
    }

    /// Apply a write set planned for `tx` and return the events it logged
    pub fn commit(&mut self, tx: &Transaction, writes: WriteSet) -> Vec<LedgerEvent> {
        let WriteSet {
            proposal,
            loan,
            borrower_index,
            lender_index,
            pool,
            credits,
            mut events,
        } = writes;

        if let Some(proposal) = proposal {
            self.proposals.put(proposal);
        }
        if let Some(loan) = loan {
            self.loans.insert(loan.id, loan);
        }
        if let Some((account, id)) = borrower_index {
            Self::index(&mut self.loans_by_borrower, account, id);
        }
        if let Some((account, id)) = lender_index {
            Self::index(&mut self.loans_by_lender, account, id);
        }
        if let Some(pool) = pool {
            self.pool = pool;
        }
        for (loan_id, payout) in credits {
            if payout.amount == 0 {
                continue;
            }
            let balance = self.balances.entry(payout.to.clone()).or_insert(0);
            // overflow is rejected in plan
            *balance += payout.amount;
            events.push(LedgerEventKind::FundsReleased {
                loan_id,
                to: payout.to,
                amount: payout.amount,
                reason: payout.reason,
            });
        }

        self.version = tx.version;
        let first = self.events.len() as u64 + 1;
        let committed: Vec<LedgerEvent> = events
            .into_iter()
            .enumerate()
            .map(|(i, kind)| LedgerEvent {
                seq: first + i as u64,
                version: tx.version,
                timestamp: tx.timestamp,
                kind,
            })
            .collect();
        self.events.extend(committed.iter().cloned());
        committed
    }

    fn index(index: &mut BTreeMap<AccountId, Vec<u64>>, account: AccountId, id: u64) {
        let ids = index.entry(account).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
}
