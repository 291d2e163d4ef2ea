//! API handlers for the lending ledger

mod account;
mod auth;
mod health;
mod loan;
mod pool;
mod proposal;

pub use account::*;
pub use auth::*;
pub use health::*;
pub use loan::*;
pub use pool::*;
pub use proposal::*;
