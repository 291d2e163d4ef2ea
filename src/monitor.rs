//! Background overdue-loan monitor
//!
//! Announces Taken loans past their deadline. It only notifies; liquidation
//! remains a lender action.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::ledger::{Ledger, Notification};

pub struct OverdueMonitor {
    ledger: Arc<Ledger>,
    notified: HashSet<u64>,
}

impl OverdueMonitor {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            notified: HashSet::new(),
        }
    }

    /// Notify every newly overdue loan once; returns the ids announced.
    /// Loans no longer overdue (repaid or liquidated) are forgotten.
    pub async fn scan(&mut self) -> Vec<u64> {
        let now = self.ledger.now();
        let overdue = self.ledger.overdue_loans().await;
        self.notified
            .retain(|id| overdue.iter().any(|loan| loan.id == *id));

        let mut announced = Vec::new();
        for loan in overdue {
            if !self.notified.insert(loan.id) {
                continue;
            }
            tracing::warn!(
                loan_id = loan.id,
                repay_by = loan.repay_by_timestamp,
                now,
                "Loan is overdue"
            );
            self.ledger.notify(Notification::LoanOverdue {
                loan_id: loan.id,
                borrower: loan.borrower,
                lender: loan.lender,
                repay_by_timestamp: loan.repay_by_timestamp,
                detected_at: now,
            });
            announced.push(loan.id);
        }
        announced
    }
}

/// Scan for overdue loans every `interval`
pub async fn overdue_detector(ledger: Arc<Ledger>, interval: Duration) {
    tracing::info!(interval_secs = interval.as_secs(), "Starting overdue detector");
    let mut monitor = OverdueMonitor::new(ledger);

    loop {
        tokio::time::sleep(interval).await;
        let announced = monitor.scan().await;
        if !announced.is_empty() {
            tracing::info!(count = announced.len(), "Announced overdue loans");
        }
    }
}
