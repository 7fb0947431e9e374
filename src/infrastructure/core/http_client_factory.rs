use crate::config::ApiEnvConfig;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use tracing::warn;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates the HTTP client for the prediction service.
    ///
    /// Transport retries are off unless `max_retries > 0`. They apply to every
    /// request, submissions included.
    pub fn create_client(api: &ApiEnvConfig) -> ClientWithMiddleware {
        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(api.timeout)
            .connect_timeout(api.connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("HttpClientFactory: falling back to default client: {}", e);
                Client::new()
            });

        let builder = ClientBuilder::new(client);
        if api.max_retries == 0 {
            return builder.build();
        }

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(api.max_retries);
        builder
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }
}
