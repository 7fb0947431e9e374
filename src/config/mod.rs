//! Configuration module for the prediction dashboard.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: remote API, query cache, and observability.

mod api_config;
mod observability_config;
mod query_config;

pub use api_config::ApiEnvConfig;
pub use observability_config::ObservabilityEnvConfig;
pub use query_config::QueryEnvConfig;

use crate::domain::prediction::MIN_STAKE;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;

/// Where dashboard data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The remote prediction service over HTTP.
    Live,
    /// In-process synthetic data.
    Mock,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(Mode::Live),
            "mock" => Ok(Mode::Mock),
            _ => anyhow::bail!("Invalid DASHBOARD_MODE: {}. Must be 'live' or 'mock'", s),
        }
    }
}

const DEFAULT_SYMBOLS: &str = "BTC-USD,ETH-USD";
const DEFAULT_STAKE: Decimal = dec!(0.1);

/// Read `key`, falling back to `default` when unset.
pub(crate) fn env_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Parse `key`, falling back to `default` when unset or malformed.
pub(crate) fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Core
    pub mode: Mode,
    pub symbols: Vec<String>,
    pub default_stake: Decimal,

    pub api: ApiEnvConfig,
    pub query: QueryEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    /// Load configuration from environment variables (and `.env`, if the
    /// caller loaded it first).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mode_str = env_or(&lookup, "DASHBOARD_MODE", "live");
        let mode = Mode::from_str(&mode_str).context("Failed to load core config")?;

        let symbols: Vec<String> = env_or(&lookup, "DASHBOARD_SYMBOLS", DEFAULT_SYMBOLS)
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        let symbols = if symbols.is_empty() {
            DEFAULT_SYMBOLS.split(',').map(str::to_string).collect()
        } else {
            symbols
        };

        let default_stake = parse_or(&lookup, "DASHBOARD_DEFAULT_STAKE", DEFAULT_STAKE).max(MIN_STAKE);

        Ok(Self {
            mode,
            symbols,
            default_stake,
            api: ApiEnvConfig::from_lookup(&lookup),
            query: QueryEnvConfig::from_lookup(&lookup),
            observability: ObservabilityEnvConfig::from_lookup(&lookup),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |k| vars.get(k).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = config_from(&[]).expect("Should parse with defaults");
        assert_eq!(config.mode, Mode::Live);
        assert_eq!(config.symbols, vec!["BTC-USD", "ETH-USD"]);
        assert_eq!(config.default_stake, dec!(0.1));
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.query.stale_time_ms, 30_000);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(Mode::from_str("mock").unwrap(), Mode::Mock);
        assert_eq!(Mode::from_str("LIVE").unwrap(), Mode::Live);
        assert!(Mode::from_str("paper").is_err());
    }

    #[test]
    fn test_invalid_mode_is_an_error() {
        let err = config_from(&[("DASHBOARD_MODE", "paper")]).unwrap_err();
        assert!(format!("{:#}", err).contains("DASHBOARD_MODE"));
    }

    #[test]
    fn test_symbols_and_stake_overrides() {
        let config = config_from(&[
            ("DASHBOARD_MODE", "mock"),
            ("DASHBOARD_SYMBOLS", " eth-usd, ,sol-usd "),
            ("DASHBOARD_DEFAULT_STAKE", "0.05"),
        ])
        .unwrap();
        assert_eq!(config.mode, Mode::Mock);
        assert_eq!(config.symbols, vec!["ETH-USD", "SOL-USD"]);
        // Raised to the minimum stake.
        assert_eq!(config.default_stake, dec!(0.1));
    }

    #[test]
    fn test_empty_symbol_list_falls_back() {
        let config = config_from(&[("DASHBOARD_SYMBOLS", " , ")]).unwrap();
        assert_eq!(config.symbols, vec!["BTC-USD", "ETH-USD"]);
    }
}
