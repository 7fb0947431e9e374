//! Observability configuration parsing from environment variables.
//!
//! This module handles the log filter and the UI log panel mirror.

use super::{env_or, parse_or};

/// Observability environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityEnvConfig {
    /// `EnvFilter` directive, e.g. `info,predictdash=debug`.
    pub log_filter: String,
    pub log_to_ui: bool,
}

impl Default for ObservabilityEnvConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            log_to_ui: true,
        }
    }
}

impl ObservabilityEnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            log_filter: env_or(&lookup, "DASHBOARD_LOG", "info"),
            log_to_ui: parse_or(&lookup, "DASHBOARD_LOG_TO_UI", true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observability_config_defaults() {
        let config = ObservabilityEnvConfig::from_lookup(|_| None);
        assert_eq!(config.log_filter, "info");
        assert!(config.log_to_ui);
    }

    #[test]
    fn test_observability_config_overrides() {
        let config = ObservabilityEnvConfig::from_lookup(|k| match k {
            "DASHBOARD_LOG" => Some("debug,reqwest=warn".to_string()),
            "DASHBOARD_LOG_TO_UI" => Some("false".to_string()),
            _ => None,
        });
        assert_eq!(config.log_filter, "debug,reqwest=warn");
        assert!(!config.log_to_ui);
    }
}
