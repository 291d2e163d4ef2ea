//! Loan domain module
//!
//! Contains the loan record, its state machine and interest strategies.

pub mod interest;
mod machine;
mod model;

pub use machine::{Payout, PayoutReason, Transition};
pub use model::*;
