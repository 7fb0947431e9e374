//! Query cache tuning parsing from environment variables.

use super::parse_or;
use crate::application::query::{QueryCacheConfig, RetryPolicy};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEnvConfig {
    pub stale_time_ms: u64,
    pub gc_time_ms: u64,
    pub gc_interval_ms: u64,
    pub retry_count: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for QueryEnvConfig {
    fn default() -> Self {
        Self {
            stale_time_ms: 30_000,
            gc_time_ms: 300_000,
            gc_interval_ms: 60_000,
            retry_count: 0,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 10_000,
        }
    }
}

impl QueryEnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            stale_time_ms: parse_or(&lookup, "QUERY_STALE_TIME_MS", d.stale_time_ms),
            gc_time_ms: parse_or(&lookup, "QUERY_GC_TIME_MS", d.gc_time_ms),
            // A zero period would make the sweep interval panic.
            gc_interval_ms: parse_or(&lookup, "QUERY_GC_INTERVAL_MS", d.gc_interval_ms).max(1),
            retry_count: parse_or(&lookup, "QUERY_RETRY_COUNT", d.retry_count),
            retry_base_delay_ms: parse_or(&lookup, "QUERY_RETRY_BASE_DELAY_MS", d.retry_base_delay_ms),
            retry_max_delay_ms: parse_or(&lookup, "QUERY_RETRY_MAX_DELAY_MS", d.retry_max_delay_ms),
        }
    }

    pub fn to_cache_config(&self) -> QueryCacheConfig {
        QueryCacheConfig {
            stale_time: Duration::from_millis(self.stale_time_ms),
            gc_time: Duration::from_millis(self.gc_time_ms),
            gc_interval: Duration::from_millis(self.gc_interval_ms),
            retry: RetryPolicy::exponential(
                self.retry_count,
                Duration::from_millis(self.retry_base_delay_ms),
                Duration::from_millis(self.retry_max_delay_ms),
            ),
        }
    }
}
