//! Configuration for the lending ledger server
//!
//! Loaded from environment variables (and a `.env` file when present), with
//! defaults suitable for local development.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::pool::{RateModel, RateModelError};

/// Secret used when `JWT_SECRET` is unset; refused in production
pub const DEFAULT_JWT_SECRET: &str = "development-secret-change-in-production";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),

    #[error("Invalid rate model: {0}")]
    InvalidRateModel(#[from] RateModelError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,

    pub port: u16,

    /// Log filter used when RUST_LOG is not set
    pub log_level: String,

    /// Write-ahead log location; in-memory only when unset
    pub ledger_wal_path: Option<PathBuf>,

    pub cors_allowed_origins: Option<String>,

    /// Requests per second per client IP
    pub rate_limit_rps: u32,

    pub jwt_secret: String,

    pub jwt_access_token_ttl_seconds: i64,

    pub rate_model: RateModel,

    /// Added on top of the floating rate to quote the fixed rate
    pub fixed_rate_spread_bps: u32,

    /// HTTP rate oracle; the static oracle is used when unset
    pub oracle_url: Option<String>,

    pub oracle_static_rate_bps: u32,

    pub oracle_max_staleness_secs: i64,

    pub overdue_scan_interval_secs: u64,
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment = lookup("ENVIRONMENT")
            .map(|s| s.parse::<Environment>())
            .transpose()?
            .unwrap_or_default();

        let port = lookup("PORT")
            .unwrap_or_else(|| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string());
        if environment.is_production() && jwt_secret == DEFAULT_JWT_SECRET {
            return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
        }

        let rate_model = RateModel::new(
            parse_or(&lookup, "RATE_BASE_BPS", 200)?,
            parse_or(&lookup, "RATE_SLOPE_BPS", 50)?,
            parse_or(&lookup, "RATE_MAX_BPS", 5000)?,
        )?;

        Ok(Config {
            environment,
            port,
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            ledger_wal_path: lookup("LEDGER_WAL_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS"),
            rate_limit_rps: parse_or(&lookup, "RATE_LIMIT_RPS", 100)?,
            jwt_secret,
            jwt_access_token_ttl_seconds: parse_or(&lookup, "JWT_ACCESS_TOKEN_TTL_SECONDS", 900)?,
            rate_model,
            fixed_rate_spread_bps: parse_or(&lookup, "FIXED_RATE_SPREAD_BPS", 200)?,
            oracle_url: lookup("ORACLE_URL").filter(|u| !u.trim().is_empty()),
            oracle_static_rate_bps: parse_or(&lookup, "ORACLE_STATIC_RATE_BPS", 300)?,
            oracle_max_staleness_secs: parse_or(&lookup, "ORACLE_MAX_STALENESS_SECS", 3600)?,
            overdue_scan_interval_secs: parse_or(&lookup, "OVERDUE_SCAN_INTERVAL_SECS", 60)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("staging".parse::<Environment>().unwrap(), Environment::Staging);
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Production);
        assert!("invalid".parse::<Environment>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.port, 3001);
        assert_eq!(config.rate_limit_rps, 100);
        assert_eq!(config.rate_model, RateModel::default());
        assert_eq!(config.fixed_rate_spread_bps, 200);
        assert_eq!(config.oracle_static_rate_bps, 300);
        assert_eq!(config.overdue_scan_interval_secs, 60);
        assert!(config.ledger_wal_path.is_none());
        assert!(config.oracle_url.is_none());
    }

    #[test]
    fn test_production_requires_jwt_secret() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("ENVIRONMENT", "production")])),
            Err(ConfigError::MissingEnvVar(_))
        ));
        let config = Config::from_lookup(lookup(&[
            ("ENVIRONMENT", "production"),
            ("JWT_SECRET", "a-real-secret"),
        ]))
        .unwrap();
        assert!(config.environment.is_production());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("PORT", "not-a-port")])),
            Err(ConfigError::InvalidPort(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("RATE_BASE_BPS", "900"), ("RATE_MAX_BPS", "500")])),
            Err(ConfigError::InvalidRateModel(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("RATE_SLOPE_BPS", "lots")])),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
