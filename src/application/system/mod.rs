use anyhow::Result;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::application::dashboard::{DashboardController, DashboardQueries};
use crate::application::query::QueryClient;
use crate::config::{Config, Mode};
use crate::domain::ports::PredictionService;
use crate::infrastructure::{
    HttpPredictionService, MockPredictionService, MockSettings, StaticCredentials,
};

/// Running data layer shared by every dashboard view: the service behind the
/// port and the query cache in front of it.
pub struct SystemHandle {
    pub config: Config,
    pub service: Arc<dyn PredictionService>,
    pub queries: DashboardQueries,
    pub runtime: Handle,
}

impl SystemHandle {
    /// Controller for one dashboard page session.
    pub fn dashboard(&self) -> DashboardController {
        DashboardController::new(
            self.service.clone(),
            self.queries.clone(),
            self.runtime.clone(),
            self.config.symbols.clone(),
            self.config.default_stake,
        )
    }

    pub fn shutdown(&self) {
        info!("Shutting down query cache");
        self.queries.shutdown();
    }
}

pub struct Application {
    pub config: Config,
    pub service: Arc<dyn PredictionService>,
}

impl Application {
    pub fn build(config: Config) -> Result<Self> {
        info!("Building Prediction Dashboard (Mode: {:?})...", config.mode);
        let service = build_service(&config)?;
        Ok(Self { config, service })
    }

    /// Start the query cache worker on `runtime`. Callable from any thread.
    pub fn start(self, runtime: &Handle) -> SystemHandle {
        let cache_config = self.config.query.to_cache_config();
        info!(
            "Starting query cache (stale_time={:?}, gc_time={:?}, retries={})",
            cache_config.stale_time, cache_config.gc_time, cache_config.retry.max_retries
        );
        let queries = QueryClient::spawn_on(runtime, cache_config);

        SystemHandle {
            config: self.config,
            service: self.service,
            queries,
            runtime: runtime.clone(),
        }
    }
}

/// Service implementation selected by `DASHBOARD_MODE`.
pub fn build_service(config: &Config) -> Result<Arc<dyn PredictionService>> {
    Ok(match config.mode {
        Mode::Mock => {
            info!("Using Mock prediction service");
            Arc::new(MockPredictionService::new(MockSettings::default()))
        }
        Mode::Live => {
            info!("Using prediction service at {}", config.api.base_url);
            if config.api.api_token.is_none() {
                warn!("DASHBOARD_API_TOKEN is not set; requests will be rejected as unauthorized");
            }
            let credentials = Arc::new(StaticCredentials::new(config.api.api_token.clone()));
            Arc::new(HttpPredictionService::new(&config.api, credentials)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query_key::QueryKey;

    fn mock_config() -> Config {
        Config::from_lookup(|k| (k == "DASHBOARD_MODE").then(|| "mock".to_string())).unwrap()
    }

    #[test]
    fn test_live_mode_rejects_bad_base_url() {
        let config = Config::from_lookup(|k| {
            (k == "DASHBOARD_API_BASE_URL").then(|| "::not-a-url".to_string())
        })
        .unwrap();
        assert!(Application::build(config).is_err());
    }

    #[tokio::test]
    async fn test_started_system_serves_dashboard() {
        let app = Application::build(mock_config()).unwrap();
        let system = app.start(&Handle::current());
        let mut dashboard = system.dashboard();

        assert_eq!(dashboard.selection().symbol, "BTC-USD");
        assert_eq!(dashboard.chart_key(), QueryKey::chart("BTC-USD", Default::default()));

        let (chart, history) = dashboard.settled().await;
        assert!(chart.data.is_some(), "chart error: {:?}", chart.error);
        assert!(history.data.is_some());
        system.shutdown();
    }
}
