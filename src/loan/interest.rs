//! Interest accrual strategies
//!
//! Rates are annual, in basis points. SimpleApr accrues linearly per second;
//! CompoundApy compounds once per day and accrues linearly (on the
//! compounded balance) inside the last partial day.

use crate::error::LedgerError;
use crate::models::{Amount, BPS_DENOMINATOR};

use super::model::InterestCalculationType;

/// Seconds per year (365 days)
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Compounding period for CompoundApy
pub const COMPOUNDING_PERIOD_SECS: u64 = 86_400;

/// Fixed-point scale for growth factors (1e18)
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// An interest accrual strategy
pub trait InterestModel {
    fn accrue(&self, principal: Amount, rate_bps: u32, elapsed_secs: u64)
        -> Result<Amount, LedgerError>;
}

/// Linear accrual: principal * rate * elapsed / (10_000 * year)
pub struct SimpleApr;

/// Periodic compounding with `period_secs` granularity
pub struct CompoundApy {
    pub period_secs: u64,
}

impl Default for CompoundApy {
    fn default() -> Self {
        Self {
            period_secs: COMPOUNDING_PERIOD_SECS,
        }
    }
}

impl InterestModel for SimpleApr {
    fn accrue(
        &self,
        principal: Amount,
        rate_bps: u32,
        elapsed_secs: u64,
    ) -> Result<Amount, LedgerError> {
        principal
            .checked_mul(rate_bps as u128)
            .and_then(|v| v.checked_mul(elapsed_secs as u128))
            .map(|v| v / (BPS_DENOMINATOR as u128 * SECONDS_PER_YEAR as u128))
            .ok_or(LedgerError::MathOverflow)
    }
}

impl InterestModel for CompoundApy {
    fn accrue(
        &self,
        principal: Amount,
        rate_bps: u32,
        elapsed_secs: u64,
    ) -> Result<Amount, LedgerError> {
        if rate_bps == 0 || elapsed_secs == 0 || principal == 0 {
            return Ok(0);
        }
        let period = self.period_secs.max(1);
        let periods_per_year = (SECONDS_PER_YEAR / period).max(1) as u128;
        let full_periods = elapsed_secs / period;
        let remainder = elapsed_secs % period;

        // growth per period: 1 + rate / periods_per_year
        let per_period = WAD
            + (rate_bps as u128 * WAD) / (BPS_DENOMINATOR as u128 * periods_per_year);
        let compounded = wad_pow(per_period, full_periods)?;

        // linear accrual inside the partial period
        let partial = WAD
            + (rate_bps as u128 * WAD * remainder as u128)
                / (BPS_DENOMINATOR as u128 * SECONDS_PER_YEAR as u128);
        let factor = wad_mul(compounded, partial)?;

        let grown = mul_wad(principal, factor)?;
        Ok(grown.saturating_sub(principal))
    }
}

/// Accrue with the strategy selected by `kind`
pub fn accrue(
    kind: InterestCalculationType,
    principal: Amount,
    rate_bps: u32,
    elapsed_secs: u64,
) -> Result<Amount, LedgerError> {
    match kind {
        InterestCalculationType::SimpleApr => SimpleApr.accrue(principal, rate_bps, elapsed_secs),
        InterestCalculationType::CompoundApy => {
            CompoundApy::default().accrue(principal, rate_bps, elapsed_secs)
        }
    }
}

fn wad_mul(a: u128, b: u128) -> Result<u128, LedgerError> {
    a.checked_mul(b)
        .map(|v| v / WAD)
        .ok_or(LedgerError::MathOverflow)
}

fn wad_pow(mut base: u128, mut exp: u64) -> Result<u128, LedgerError> {
    let mut acc = WAD;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = wad_mul(acc, base)?;
        }
        exp >>= 1;
        if exp > 0 {
            base = wad_mul(base, base)?;
        }
    }
    Ok(acc)
}

/// amount * factor / WAD without forming amount * factor for large amounts
fn mul_wad(amount: Amount, factor: u128) -> Result<Amount, LedgerError> {
    let whole = (amount / WAD)
        .checked_mul(factor)
        .ok_or(LedgerError::MathOverflow)?;
    let frac = (amount % WAD)
        .checked_mul(factor)
        .map(|v| v / WAD)
        .ok_or(LedgerError::MathOverflow)?;
    whole.checked_add(frac).ok_or(LedgerError::MathOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ETH: u128 = WAD;

    #[test]
    fn test_simple_apr_full_year() {
        let interest = SimpleApr.accrue(ETH, 1000, SECONDS_PER_YEAR).unwrap();
        assert_eq!(interest, ETH / 10);
    }

    #[test]
    fn test_simple_apr_one_day() {
        let interest = SimpleApr.accrue(ETH, 1000, 86_400).unwrap();
        assert_eq!(interest, ETH / 10 / 365);
    }

    #[test]
    fn test_simple_apr_is_linear() {
        let one = SimpleApr.accrue(1_000_000, 500, 1000).unwrap();
        let two = SimpleApr.accrue(1_000_000, 500, 2000).unwrap();
        assert!(two >= 2 * one && two <= 2 * one + 1);
    }

    #[test]
    fn test_zero_elapsed_accrues_nothing() {
        assert_eq!(SimpleApr.accrue(ETH, 1000, 0).unwrap(), 0);
        assert_eq!(CompoundApy::default().accrue(ETH, 1000, 0).unwrap(), 0);
    }

    #[test]
    fn test_compound_single_day_matches_simple() {
        // one full period compounds exactly once: same as daily simple rate
        let compound = CompoundApy::default().accrue(ETH, 1000, 86_400).unwrap();
        let simple = SimpleApr.accrue(ETH, 1000, 86_400).unwrap();
        assert!(compound.abs_diff(simple) <= 1);
    }

    #[test]
    fn test_compound_year_exceeds_simple() {
        let compound = CompoundApy::default()
            .accrue(ETH, 1000, SECONDS_PER_YEAR)
            .unwrap();
        let simple = SimpleApr.accrue(ETH, 1000, SECONDS_PER_YEAR).unwrap();
        assert!(compound > simple);
        // (1 + 0.1/365)^365 - 1 ≈ 0.10516
        assert!(compound > ETH * 1051 / 10_000);
        assert!(compound < ETH * 1052 / 10_000);
    }

    #[test]
    fn test_compound_large_principal_does_not_overflow() {
        let principal = 1_000_000 * ETH;
        let interest = CompoundApy::default()
            .accrue(principal, 1000, SECONDS_PER_YEAR)
            .unwrap();
        assert!(interest > principal / 10);
    }

    #[test]
    fn test_accrue_dispatches_on_kind() {
        let simple = accrue(InterestCalculationType::SimpleApr, ETH, 800, SECONDS_PER_YEAR).unwrap();
        let compound =
            accrue(InterestCalculationType::CompoundApy, ETH, 800, SECONDS_PER_YEAR).unwrap();
        assert_eq!(simple, ETH * 8 / 100);
        assert!(compound > simple);
    }
}
