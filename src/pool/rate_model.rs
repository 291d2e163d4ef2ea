//! Utilization-driven floating rate curve

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::BPS_DENOMINATOR;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RateModelError {
    #[error("base rate {base} exceeds max rate {max}")]
    BaseAboveMax { base: u32, max: u32 },

    #[error("max rate {0} exceeds 10000 bps")]
    MaxAboveCap(u32),
}

/// Floating rate parameters
///
/// rate = min(max_rate, base_rate + utilization * slope / 1000)
///
/// so `slope_bps` is the increase per 10% of utilization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateModel {
    pub base_rate_bps: u32,
    pub slope_bps: u32,
    pub max_rate_bps: u32,
}

impl Default for RateModel {
    fn default() -> Self {
        Self {
            base_rate_bps: 200,
            slope_bps: 50,
            max_rate_bps: 5000,
        }
    }
}

impl RateModel {
    pub fn new(base_rate_bps: u32, slope_bps: u32, max_rate_bps: u32) -> Result<Self, RateModelError> {
        if max_rate_bps > BPS_DENOMINATOR {
            return Err(RateModelError::MaxAboveCap(max_rate_bps));
        }
        if base_rate_bps > max_rate_bps {
            return Err(RateModelError::BaseAboveMax {
                base: base_rate_bps,
                max: max_rate_bps,
            });
        }
        Ok(Self {
            base_rate_bps,
            slope_bps,
            max_rate_bps,
        })
    }

    /// Floating rate at the given utilization (bps). Non-decreasing in
    /// utilization.
    pub fn floating_rate(&self, utilization_bps: u32) -> u32 {
        let utilization = utilization_bps.min(BPS_DENOMINATOR) as u64;
        let component = utilization * self.slope_bps as u64 / 1000;
        let rate = (self.base_rate_bps as u64).saturating_add(component);
        rate.min(self.max_rate_bps as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_curve_points() {
        let model = RateModel::default();
        assert_eq!(model.floating_rate(0), 200);
        assert_eq!(model.floating_rate(4500), 425);
        assert_eq!(model.floating_rate(5000), 450);
        assert_eq!(model.floating_rate(10_000), 700);
    }

    #[test]
    fn test_rate_is_monotonic_and_capped() {
        let model = RateModel::new(100, 900, 5000).unwrap();
        let mut prev = 0;
        for u in (0..=10_000).step_by(250) {
            let r = model.floating_rate(u);
            assert!(r >= prev);
            assert!(r <= 5000);
            prev = r;
        }
        assert_eq!(model.floating_rate(10_000), 5000);
        // utilization above 100% is treated as 100%
        assert_eq!(model.floating_rate(20_000), model.floating_rate(10_000));
    }

    #[test]
    fn test_invalid_parameters() {
        assert_eq!(
            RateModel::new(600, 10, 500),
            Err(RateModelError::BaseAboveMax { base: 600, max: 500 })
        );
        assert_eq!(
            RateModel::new(0, 10, 10_001),
            Err(RateModelError::MaxAboveCap(10_001))
        );
    }
}
