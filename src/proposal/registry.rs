//! Append-only proposal registry

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::loan::LoanTerms;
use crate::models::{AccountId, Amount};

use super::model::LoanProposal;

/// Proposals keyed by sequential id (id n lives at index n - 1)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposalRegistry {
    proposals: Vec<LoanProposal>,
}

impl ProposalRegistry {
    pub fn next_id(&self) -> u64 {
        self.proposals.len() as u64 + 1
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&LoanProposal> {
        id.checked_sub(1)
            .and_then(|idx| self.proposals.get(idx as usize))
    }

    pub fn require(&self, id: u64) -> Result<&LoanProposal, LedgerError> {
        self.get(id).ok_or(LedgerError::NotFound {
            entity: "proposal",
            id,
        })
    }

    /// All proposals in creation order
    pub fn all(&self) -> &[LoanProposal] {
        &self.proposals
    }

    /// Proposals not yet accepted, in creation order
    pub fn open(&self) -> impl Iterator<Item = &LoanProposal> {
        self.proposals.iter().filter(|p| p.is_open())
    }

    /// Build the next proposal without storing it
    pub fn draft(
        &self,
        borrower: &AccountId,
        terms: LoanTerms,
        oracle: String,
        now: i64,
    ) -> Result<LoanProposal, LedgerError> {
        terms.check(now)?;
        Ok(LoanProposal {
            id: self.next_id(),
            borrower: borrower.clone(),
            terms,
            oracle,
            accepted: false,
            accepted_lender: None,
            accepted_loan_id: None,
            creation_timestamp: now,
        })
    }

    /// Check an acceptance and return the accepted record without storing it.
    /// A proposal past its repay-by time can no longer be funded.
    pub fn draft_acceptance(
        &self,
        id: u64,
        lender: &AccountId,
        value: Amount,
        loan_id: u64,
        now: i64,
    ) -> Result<LoanProposal, LedgerError> {
        let proposal = self.require(id)?;
        if proposal.accepted {
            return Err(LedgerError::AlreadyAccepted(id));
        }
        if &proposal.borrower == lender {
            return Err(LedgerError::Unauthorized {
                caller: lender.clone(),
                action: "accept own proposal",
            });
        }
        if proposal.terms.repay_by_timestamp <= now {
            return Err(LedgerError::DeadlinePassed {
                deadline: proposal.terms.repay_by_timestamp,
                now,
            });
        }
        if value != proposal.terms.loan_amount {
            return Err(LedgerError::exact(proposal.terms.loan_amount, value));
        }

        let mut accepted = proposal.clone();
        accepted.accepted = true;
        accepted.accepted_lender = Some(lender.clone());
        accepted.accepted_loan_id = Some(loan_id);
        Ok(accepted)
    }

    /// Store a drafted record: appends a new id or replaces an existing one
    pub(crate) fn put(&mut self, proposal: LoanProposal) {
        match proposal.id.checked_sub(1).map(|i| i as usize) {
            Some(idx) if idx < self.proposals.len() => self.proposals[idx] = proposal,
            _ => self.proposals.push(proposal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::InterestCalculationType;

    fn terms() -> LoanTerms {
        LoanTerms {
            loan_amount: 100,
            fee_amount: 1,
            collateral_amount: 150,
            repay_by_timestamp: 1_000,
            fixed_rate_bps: 1000,
            floating_rate_bps: 800,
            interest_calculation_type: InterestCalculationType::SimpleApr,
        }
    }

    fn registry_with(n: usize) -> ProposalRegistry {
        let mut reg = ProposalRegistry::default();
        for _ in 0..n {
            let p = reg
                .draft(&AccountId::from("bob"), terms(), "manual".into(), 0)
                .unwrap();
            reg.put(p);
        }
        reg
    }

    #[test]
    fn test_ids_are_sequential() {
        let reg = registry_with(3);
        let ids: Vec<u64> = reg.all().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(reg.get(0).is_none());
        assert!(reg.get(4).is_none());
    }

    #[test]
    fn test_draft_rejects_past_deadline() {
        let reg = ProposalRegistry::default();
        let err = reg
            .draft(&AccountId::from("bob"), terms(), "manual".into(), 1_000)
            .unwrap_err();
        assert!(matches!(err, LedgerError::DeadlinePassed { .. }));
    }

    #[test]
    fn test_accept_at_most_once() {
        let mut reg = registry_with(2);
        let lender = AccountId::from("alice");
        let accepted = reg.draft_acceptance(1, &lender, 100, 7, 0).unwrap();
        assert!(accepted.accepted);
        assert_eq!(accepted.accepted_lender, Some(lender.clone()));
        // drafting does not store
        assert!(reg.get(1).unwrap().is_open());
        reg.put(accepted);

        assert_eq!(
            reg.draft_acceptance(1, &lender, 100, 8, 0).unwrap_err(),
            LedgerError::AlreadyAccepted(1)
        );
        let open: Vec<u64> = reg.open().map(|p| p.id).collect();
        assert_eq!(open, vec![2]);
    }

    #[test]
    fn test_accept_guards() {
        let reg = registry_with(1);
        assert!(matches!(
            reg.draft_acceptance(9, &AccountId::from("alice"), 100, 1, 0),
            Err(LedgerError::NotFound { .. })
        ));
        assert!(matches!(
            reg.draft_acceptance(1, &AccountId::from("alice"), 99, 1, 0),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            reg.draft_acceptance(1, &AccountId::from("bob"), 100, 1, 0),
            Err(LedgerError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_expired_proposal_cannot_be_accepted() {
        let reg = registry_with(1);
        let alice = AccountId::from("alice");
        assert_eq!(
            reg.draft_acceptance(1, &alice, 100, 1, 1_000).unwrap_err(),
            LedgerError::DeadlinePassed { deadline: 1_000, now: 1_000 }
        );
        // the deadline is checked before the value
        assert!(matches!(
            reg.draft_acceptance(1, &alice, 99, 1, 1_001),
            Err(LedgerError::DeadlinePassed { .. })
        ));
        assert!(reg.draft_acceptance(1, &alice, 100, 1, 999).is_ok());
    }
}
