//! Rate oracle adapters and the quoter that turns a round into proposal rates

use axum::async_trait;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::model::{OracleError, RoundData};
use crate::ledger::Clock;
use crate::proposal::RateQuote;

/// Price feed that can report its latest round
#[async_trait]
pub trait RateOracle: Send + Sync {
    fn name(&self) -> String;

    async fn latest_round_data(&self) -> Result<RoundData, OracleError>;
}

/// Oracle answering a configured rate, always fresh as of the ledger clock
pub struct StaticRateOracle {
    rate_bps: AtomicI64,
    round: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl StaticRateOracle {
    pub fn new(rate_bps: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            rate_bps: AtomicI64::new(rate_bps as i64),
            round: AtomicU64::new(1),
            clock,
        }
    }

    /// Publish a new reference rate as the next round
    pub fn set_rate(&self, rate_bps: u32) {
        self.rate_bps.store(rate_bps as i64, Ordering::SeqCst);
        self.round.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RateOracle for StaticRateOracle {
    fn name(&self) -> String {
        "static".to_string()
    }

    async fn latest_round_data(&self) -> Result<RoundData, OracleError> {
        let now = self.clock.now();
        let round_id = self.round.load(Ordering::SeqCst);
        Ok(RoundData {
            round_id,
            price: self.rate_bps.load(Ordering::SeqCst) as i128,
            started_at: now,
            updated_at: now,
            answered_in_round: round_id,
        })
    }
}

/// Oracle read over HTTP; the endpoint returns a `RoundData` JSON body
pub struct HttpRateOracle {
    client: reqwest::Client,
    url: String,
}

impl HttpRateOracle {
    pub fn new(url: impl Into<String>) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl RateOracle for HttpRateOracle {
    fn name(&self) -> String {
        self.url.clone()
    }

    async fn latest_round_data(&self) -> Result<RoundData, OracleError> {
        let round = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<RoundData>()
            .await?;
        Ok(round)
    }
}

/// Derives proposal rates from the oracle reference rate and the pool
pub struct RateQuoter {
    oracle: Arc<dyn RateOracle>,
    fixed_spread_bps: u32,
    max_staleness_secs: i64,
}

impl RateQuoter {
    pub fn new(oracle: Arc<dyn RateOracle>, fixed_spread_bps: u32, max_staleness_secs: i64) -> Self {
        Self {
            oracle,
            fixed_spread_bps,
            max_staleness_secs,
        }
    }

    pub fn source(&self) -> String {
        self.oracle.name()
    }

    /// floating = reference + pool floating rate, fixed = floating + spread;
    /// both capped at 10000 bps.
    pub async fn quote(&self, pool_floating_bps: u32, now: i64) -> Result<RateQuote, OracleError> {
        let round = self.oracle.latest_round_data().await?;
        round.check(now, self.max_staleness_secs)?;

        let floating = round
            .reference_rate_bps()
            .saturating_add(pool_floating_bps)
            .min(10_000);
        let fixed = floating.saturating_add(self.fixed_spread_bps).min(10_000);

        tracing::debug!(
            oracle = %self.oracle.name(),
            round_id = round.round_id,
            floating,
            fixed,
            "Quoted proposal rates"
        );

        Ok(RateQuote {
            fixed_rate_bps: fixed,
            floating_rate_bps: floating,
            source: self.oracle.name(),
            round_id: round.round_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ManualClock;

    struct FixedRound(RoundData);

    #[async_trait]
    impl RateOracle for FixedRound {
        fn name(&self) -> String {
            "fixed".to_string()
        }

        async fn latest_round_data(&self) -> Result<RoundData, OracleError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_quote_from_static_oracle() {
        let clock = Arc::new(ManualClock::new(1_000));
        let oracle = Arc::new(StaticRateOracle::new(300, clock));
        let quoter = RateQuoter::new(oracle.clone(), 200, 3600);

        let quote = quoter.quote(450, 1_000).await.unwrap();
        assert_eq!(quote.floating_rate_bps, 750);
        assert_eq!(quote.fixed_rate_bps, 950);
        assert_eq!(quote.round_id, 1);

        oracle.set_rate(9_900);
        let quote = quoter.quote(450, 1_000).await.unwrap();
        assert_eq!(quote.floating_rate_bps, 10_000);
        assert_eq!(quote.fixed_rate_bps, 10_000);
        assert_eq!(quote.round_id, 2);
    }

    #[tokio::test]
    async fn test_stale_round_is_rejected() {
        let quoter = RateQuoter::new(
            Arc::new(FixedRound(RoundData {
                round_id: 7,
                price: 300,
                started_at: 0,
                updated_at: 0,
                answered_in_round: 7,
            })),
            200,
            60,
        );
        assert!(matches!(
            quoter.quote(0, 61).await,
            Err(OracleError::Stale { round_id: 7, .. })
        ));
        assert!(quoter.quote(0, 60).await.is_ok());
    }
}
