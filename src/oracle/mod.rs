//! Rate oracle module
//!
//! Reads a reference rate from a price feed and derives default proposal
//! rates from it.

mod model;
mod service;

pub use model::{OracleError, RoundData};
pub use service::{HttpRateOracle, RateOracle, RateQuoter, StaticRateOracle};
