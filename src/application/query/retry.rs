use crate::domain::errors::DashboardError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry schedule for query fetches.
///
/// Retries run under the same request token, so a superseded fetch that is
/// still backing off cannot overwrite a newer result. Only transient failures
/// are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// No retries; the default for dashboard queries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }

    pub fn exponential(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Delay before retry number `attempt` (zero-based), doubling each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, DashboardError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DashboardError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && e.is_transient() => {
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max = self.max_retries,
                        "Fetch failed ({}), retrying in {:?}",
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
