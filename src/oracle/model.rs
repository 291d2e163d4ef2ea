//! Rate oracle models

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Latest answer of a price feed round. `price` is a reference rate in
/// basis points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundData {
    pub round_id: u64,
    pub price: i128,
    pub started_at: i64,
    pub updated_at: i64,
    pub answered_in_round: u64,
}

/// Oracle errors
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("oracle returned an invalid round: {0}")]
    InvalidRound(String),

    #[error("oracle round {round_id} is stale (updated at {updated_at}, now {now})")]
    Stale {
        round_id: u64,
        updated_at: i64,
        now: i64,
    },
}

impl RoundData {
    /// Reject negative answers, incomplete rounds and answers older than
    /// `max_staleness_secs`.
    pub fn check(&self, now: i64, max_staleness_secs: i64) -> Result<(), OracleError> {
        if self.price < 0 {
            return Err(OracleError::InvalidRound(format!(
                "negative price {} in round {}",
                self.price, self.round_id
            )));
        }
        if self.answered_in_round < self.round_id {
            return Err(OracleError::InvalidRound(format!(
                "round {} answered in earlier round {}",
                self.round_id, self.answered_in_round
            )));
        }
        if now.saturating_sub(self.updated_at) > max_staleness_secs {
            return Err(OracleError::Stale {
                round_id: self.round_id,
                updated_at: self.updated_at,
                now,
            });
        }
        Ok(())
    }

    /// Reference rate clamped into 0..=10000 bps
    pub fn reference_rate_bps(&self) -> u32 {
        self.price.clamp(0, 10_000) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(price: i128, updated_at: i64) -> RoundData {
        RoundData {
            round_id: 5,
            price,
            started_at: updated_at,
            updated_at,
            answered_in_round: 5,
        }
    }

    #[test]
    fn test_round_checks() {
        assert!(round(300, 1_000).check(1_100, 3600).is_ok());
        assert!(matches!(
            round(-1, 1_000).check(1_000, 3600),
            Err(OracleError::InvalidRound(_))
        ));
        assert!(matches!(
            round(300, 1_000).check(5_000, 3600),
            Err(OracleError::Stale { .. })
        ));

        let mut incomplete = round(300, 1_000);
        incomplete.answered_in_round = 4;
        assert!(matches!(
            incomplete.check(1_000, 3600),
            Err(OracleError::InvalidRound(_))
        ));
    }

    #[test]
    fn test_reference_rate_is_clamped() {
        assert_eq!(round(300, 0).reference_rate_bps(), 300);
        assert_eq!(round(50_000, 0).reference_rate_bps(), 10_000);
    }
}
