//! Lending ledger
//!
//! The registry coordinator: owns every proposal, loan, pool balance and
//! settlement balance, and serialises all writes through one lock. Each
//! write is planned, appended to the write-ahead log and then committed,
//! so a failed guard or a failed log write leaves no trace.

mod clock;
mod events;
mod state;
mod wal;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{LedgerEvent, LedgerEventKind, Notification};
pub use state::{Command, LedgerState, Transaction, WriteSet};
pub use wal::{WalError, WalRecord, WriteAheadLog};

use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::error::LedgerError;
use crate::loan::{LoanState, LoanTerms, LoanView};
use crate::models::{AccountId, Amount};
use crate::oracle::RateQuoter;
use crate::pool::{PoolStats, RateModel};
use crate::proposal::{CreateLoanRequest, CreateProposalRequest, LoanProposal, MANUAL_RATE_SOURCE};

const NOTIFICATION_CAPACITY: usize = 256;

struct Inner {
    state: LedgerState,
    wal: Option<WriteAheadLog>,
}

pub struct Ledger {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    rate_model: RateModel,
    quoter: RateQuoter,
    notifications: broadcast::Sender<Notification>,
}

impl Ledger {
    /// In-memory ledger with no write-ahead log
    pub fn new(clock: Arc<dyn Clock>, rate_model: RateModel, quoter: RateQuoter) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                state: LedgerState::default(),
                wal: None,
            }),
            clock,
            rate_model,
            quoter,
            notifications,
        }
    }

    /// Ledger backed by the log at `path`, rebuilt by replaying it
    pub async fn open(
        path: impl AsRef<Path>,
        clock: Arc<dyn Clock>,
        rate_model: RateModel,
        quoter: RateQuoter,
    ) -> Result<Self, LedgerError> {
        let (wal, txs) = WriteAheadLog::open(path)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Self::with_wal(wal, txs, clock, rate_model, quoter)
    }

    /// Ledger over an already opened log and the transactions read from it
    pub(crate) fn with_wal(
        wal: WriteAheadLog,
        txs: Vec<Transaction>,
        clock: Arc<dyn Clock>,
        rate_model: RateModel,
        quoter: RateQuoter,
    ) -> Result<Self, LedgerError> {
        let state = Self::replay(txs)?;
        tracing::info!(version = state.version, loans = state.loans.len(), "Ledger replayed");

        let mut ledger = Self::new(clock, rate_model, quoter);
        let inner = ledger.inner.get_mut();
        inner.state = state;
        inner.wal = Some(wal);
        Ok(ledger)
    }

    /// Rebuild state from logged transactions through the same plan/commit
    /// path live writes take
    pub fn replay(txs: Vec<Transaction>) -> Result<LedgerState, LedgerError> {
        let mut state = LedgerState::default();
        for tx in txs {
            let writes = state.plan(&tx).map_err(|e| {
                LedgerError::Storage(format!("replay failed at version {}: {}", tx.version, e))
            })?;
            state.commit(&tx, writes);
        }
        Ok(state)
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn rate_model(&self) -> RateModel {
        self.rate_model
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn notifier(&self) -> broadcast::Sender<Notification> {
        self.notifications.clone()
    }

    /// Push a notification that is not backed by a transaction
    pub fn notify(&self, notification: Notification) {
        // no receivers is not an error
        let _ = self.notifications.send(notification);
    }

    async fn execute<T>(
        &self,
        caller: &AccountId,
        command: Command,
        output: impl FnOnce(&LedgerState, i64) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let tx = Transaction {
            version: inner.state.version + 1,
            caller: caller.clone(),
            timestamp: self.clock.now(),
            command,
        };

        let writes = inner.state.plan(&tx).map_err(|e| {
            tracing::warn!(
                kind = tx.command.kind(),
                caller = %tx.caller,
                code = e.code(),
                "Transaction rejected: {}",
                e
            );
            e
        })?;

        if let Some(wal) = inner.wal.as_mut() {
            wal.append(&tx).await.map_err(|e| {
                tracing::error!(version = tx.version, "Failed to append to write-ahead log: {}", e);
                LedgerError::Storage(e.to_string())
            })?;
        }

        let events = inner.state.commit(&tx, writes);
        tracing::info!(
            version = tx.version,
            kind = tx.command.kind(),
            caller = %tx.caller,
            events = events.len(),
            "Transaction committed"
        );
        for event in events {
            self.notify(Notification::Ledger(event));
        }

        output(&inner.state, tx.timestamp)
    }

    async fn loan_command(&self, caller: &AccountId, command: Command, loan_id: u64) -> Result<LoanView, LedgerError> {
        self.execute(caller, command, |state, now| {
            Ok(state.require_loan(loan_id)?.view(now))
        })
        .await
    }

    /// Concrete terms for a request; missing rates are quoted from the
    /// oracle against the current pool floating rate
    async fn resolve_terms(&self, request: CreateProposalRequest) -> Result<(LoanTerms, String), LedgerError> {
        if request.has_explicit_rates() {
            return Ok((request.into_terms(None), MANUAL_RATE_SOURCE.to_string()));
        }
        let quote = self
            .quoter
            .quote(self.floating_rate_bps().await, self.clock.now())
            .await
            .map_err(|e| {
                tracing::warn!(oracle = %self.quoter.source(), "Rejected oracle round: {}", e);
                LedgerError::Oracle(e.to_string())
            })?;
        let source = quote.source.clone();
        Ok((request.into_terms(Some(quote)), source))
    }

    // ===== Proposals =====

    pub async fn create_proposal(
        &self,
        caller: &AccountId,
        request: CreateProposalRequest,
    ) -> Result<LoanProposal, LedgerError> {
        let (terms, oracle) = self.resolve_terms(request).await?;
        self.execute(caller, Command::CreateProposal { terms, oracle }, |state, _| {
            let id = state.proposals.len() as u64;
            state.proposals.require(id).cloned()
        })
        .await
    }

    /// Accept a proposal as lender; returns the loan it created
    pub async fn accept_proposal(
        &self,
        caller: &AccountId,
        proposal_id: u64,
        value: Amount,
    ) -> Result<LoanView, LedgerError> {
        self.execute(caller, Command::AcceptProposal { proposal_id, value }, |state, now| {
            let loan_id = state
                .proposals
                .require(proposal_id)?
                .accepted_loan_id
                .ok_or(LedgerError::InvalidState {
                    entity: "proposal",
                    id: proposal_id,
                    state: "open".to_string(),
                    action: "read accepted loan",
                })?;
            Ok(state.require_loan(loan_id)?.view(now))
        })
        .await
    }

    pub async fn proposal(&self, id: u64) -> Result<LoanProposal, LedgerError> {
        self.inner.lock().await.state.proposals.require(id).cloned()
    }

    pub async fn open_proposals(&self) -> Vec<LoanProposal> {
        self.inner.lock().await.state.proposals.open().cloned().collect()
    }

    pub async fn all_proposals(&self) -> Vec<LoanProposal> {
        self.inner.lock().await.state.proposals.all().to_vec()
    }

    // ===== Loans =====

    /// Publish a lender offer; the loan starts in Created
    pub async fn create_loan(&self, caller: &AccountId, request: CreateLoanRequest) -> Result<LoanView, LedgerError> {
        let (terms, _) = self.resolve_terms(request).await?;
        self.execute(caller, Command::CreateLoan { terms }, |state, now| {
            let id = state.loans.len() as u64;
            Ok(state.require_loan(id)?.view(now))
        })
        .await
    }

    pub async fn fund_loan(&self, caller: &AccountId, loan_id: u64, value: Amount) -> Result<LoanView, LedgerError> {
        self.loan_command(caller, Command::FundLoan { loan_id, value }, loan_id)
            .await
    }

    pub async fn accept_loan_terms(
        &self,
        caller: &AccountId,
        loan_id: u64,
        value: Amount,
    ) -> Result<LoanView, LedgerError> {
        self.loan_command(caller, Command::AcceptLoanTerms { loan_id, value }, loan_id)
            .await
    }

    pub async fn take_loan(&self, caller: &AccountId, loan_id: u64) -> Result<LoanView, LedgerError> {
        self.loan_command(caller, Command::TakeLoan { loan_id }, loan_id).await
    }

    pub async fn switch_rate_type(&self, caller: &AccountId, loan_id: u64) -> Result<LoanView, LedgerError> {
        self.loan_command(caller, Command::SwitchRateType { loan_id }, loan_id)
            .await
    }

    pub async fn repay(&self, caller: &AccountId, loan_id: u64, value: Amount) -> Result<LoanView, LedgerError> {
        self.loan_command(caller, Command::Repay { loan_id, value }, loan_id)
            .await
    }

    pub async fn liquidate(&self, caller: &AccountId, loan_id: u64) -> Result<LoanView, LedgerError> {
        self.loan_command(caller, Command::Liquidate { loan_id }, loan_id)
            .await
    }

    pub async fn loan(&self, id: u64) -> Result<LoanView, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(inner.state.require_loan(id)?.view(self.clock.now()))
    }

    pub async fn loan_state(&self, id: u64) -> Result<LoanState, LedgerError> {
        Ok(self.inner.lock().await.state.require_loan(id)?.state)
    }

    pub async fn all_loans(&self) -> Vec<LoanView> {
        let now = self.clock.now();
        let inner = self.inner.lock().await;
        inner.state.loans.values().map(|l| l.view(now)).collect()
    }

    pub async fn loans_by_borrower(&self, borrower: &AccountId) -> Vec<LoanView> {
        let now = self.clock.now();
        let inner = self.inner.lock().await;
        Self::indexed(&inner.state, inner.state.loans_by_borrower.get(borrower), now)
    }

    pub async fn loans_by_lender(&self, lender: &AccountId) -> Vec<LoanView> {
        let now = self.clock.now();
        let inner = self.inner.lock().await;
        Self::indexed(&inner.state, inner.state.loans_by_lender.get(lender), now)
    }

    /// Taken loans past their repay-by deadline
    pub async fn overdue_loans(&self) -> Vec<LoanView> {
        let now = self.clock.now();
        let inner = self.inner.lock().await;
        inner
            .state
            .loans
            .values()
            .filter(|l| l.is_overdue(now))
            .map(|l| l.view(now))
            .collect()
    }

    fn indexed(state: &LedgerState, ids: Option<&Vec<u64>>, now: i64) -> Vec<LoanView> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| state.loans.get(id))
            .map(|l| l.view(now))
            .collect()
    }

    // ===== Pool =====

    pub async fn add_liquidity(&self, caller: &AccountId, amount: Amount) -> Result<PoolStats, LedgerError> {
        let rate_model = self.rate_model;
        self.execute(caller, Command::AddLiquidity { amount }, move |state, _| {
            Ok(Self::stats(state, &rate_model))
        })
        .await
    }

    pub async fn remove_liquidity(&self, caller: &AccountId, amount: Amount) -> Result<PoolStats, LedgerError> {
        let rate_model = self.rate_model;
        self.execute(caller, Command::RemoveLiquidity { amount }, move |state, _| {
            Ok(Self::stats(state, &rate_model))
        })
        .await
    }

    pub async fn total_liquidity(&self) -> Amount {
        self.inner.lock().await.state.pool.total_liquidity
    }

    pub async fn utilization_bps(&self) -> u32 {
        self.inner.lock().await.state.pool.utilization_bps()
    }

    pub async fn floating_rate_bps(&self) -> u32 {
        self.rate_model.floating_rate(self.utilization_bps().await)
    }

    pub async fn pool_stats(&self) -> PoolStats {
        Self::stats(&self.inner.lock().await.state, &self.rate_model)
    }

    fn stats(state: &LedgerState, rate_model: &RateModel) -> PoolStats {
        let utilization_bps = state.pool.utilization_bps();
        PoolStats {
            total_liquidity: state.pool.total_liquidity,
            total_lent: state.pool.total_lent,
            utilization_bps,
            floating_rate_bps: rate_model.floating_rate(utilization_bps),
            providers: state.pool.deposits.len(),
        }
    }

    // ===== Accounts & events =====

    pub async fn balance(&self, account: &AccountId) -> Amount {
        self.inner.lock().await.state.balance_of(account)
    }

    /// Events with `seq > since`, oldest first, at most `limit`
    pub async fn events_since(&self, since: u64, limit: usize) -> Vec<LedgerEvent> {
        let inner = self.inner.lock().await;
        let start = (since as usize).min(inner.state.events.len());
        inner.state.events[start..].iter().take(limit).cloned().collect()
    }

    pub async fn version(&self) -> u64 {
        self.inner.lock().await.state.version
    }

    /// Snapshot of the full state, for comparison after replay
    pub async fn snapshot(&self) -> LedgerState {
        self.inner.lock().await.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::wal::faults::{Faults, FaultySink};
    use super::*;
    use crate::oracle::StaticRateOracle;

    const T0: i64 = 1_700_000_000;

    fn acct(s: &str) -> AccountId {
        AccountId::from(s)
    }

    fn quoter(clock: Arc<dyn Clock>) -> RateQuoter {
        RateQuoter::new(Arc::new(StaticRateOracle::new(300, clock)), 200, 3600)
    }

    #[tokio::test]
    async fn test_failed_log_write_leaves_ledger_unchanged() {
        let path = std::env::temp_dir().join(format!("ratelend-ledger-{}.log", uuid::Uuid::new_v4()));
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(T0));
        let faults = Arc::new(Faults::default());

        let (wal, txs) = WriteAheadLog::open(&path).await.unwrap();
        let wal = wal.with_sink(FaultySink::wrap(faults.clone()));
        let ledger = Ledger::with_wal(wal, txs, clock.clone(), RateModel::default(), quoter(clock.clone())).unwrap();
        let mut rx = ledger.subscribe();

        ledger.add_liquidity(&acct("lp"), 100).await.unwrap();
        let _ = rx.try_recv();
        let before = ledger.snapshot().await;

        Faults::arm(&faults.sync);
        let err = ledger.add_liquidity(&acct("lp"), 50).await.unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));

        Faults::arm(&faults.short_write);
        let err = ledger.add_liquidity(&acct("lp"), 60).await.unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));

        let after = ledger.snapshot().await;
        assert_eq!(after.version, before.version);
        assert_eq!(after.events, before.events);
        assert_eq!(
            serde_json::to_value(&after).unwrap(),
            serde_json::to_value(&before).unwrap()
        );
        assert_eq!(ledger.total_liquidity().await, 100);
        assert!(rx.try_recv().is_err());

        // the next write takes the version the failed ones could not
        ledger.add_liquidity(&acct("lp"), 25).await.unwrap();
        assert_eq!(ledger.version().await, 2);
        let live = ledger.snapshot().await;
        drop(ledger);

        let reopened = Ledger::open(&path, clock.clone(), RateModel::default(), quoter(clock))
            .await
            .unwrap();
        let replayed = reopened.snapshot().await;
        assert_eq!(replayed.version, 2);
        assert_eq!(reopened.total_liquidity().await, 125);
        assert_eq!(replayed.events, live.events);
        assert_eq!(
            serde_json::to_value(&replayed).unwrap(),
            serde_json::to_value(&live).unwrap()
        );
        let _ = std::fs::remove_file(&path);
    }
}
