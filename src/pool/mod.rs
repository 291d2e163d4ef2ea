//! Liquidity pool domain module
//!
//! Pool balances, utilization and the floating rate curve priced from it.

mod model;
mod rate_model;

pub use model::{LiquidityPool, PoolStats};
pub use rate_model::{RateModel, RateModelError};
