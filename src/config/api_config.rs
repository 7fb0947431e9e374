//! Remote service configuration parsing from environment variables.

use super::{env_or, parse_or};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEnvConfig {
    pub base_url: String,
    /// Bearer credential; requests fail as unauthorized without it.
    pub api_token: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Transport-level retries for transient failures (0 disables).
    pub max_retries: u32,
}

impl Default for ApiEnvConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_token: None,
            timeout: Duration::from_millis(30_000),
            connect_timeout: Duration::from_millis(10_000),
            max_retries: 0,
        }
    }
}

impl ApiEnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_or(&lookup, "DASHBOARD_API_BASE_URL", &defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            api_token: lookup("DASHBOARD_API_TOKEN").filter(|t| !t.trim().is_empty()),
            timeout: Duration::from_millis(parse_or(&lookup, "DASHBOARD_HTTP_TIMEOUT_MS", 30_000)),
            connect_timeout: Duration::from_millis(parse_or(
                &lookup,
                "DASHBOARD_HTTP_CONNECT_TIMEOUT_MS",
                10_000,
            )),
            max_retries: parse_or(&lookup, "DASHBOARD_HTTP_MAX_RETRIES", 0),
        }
    }
}
