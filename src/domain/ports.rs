use crate::domain::errors::DashboardError;
use crate::domain::prediction::{PredictionReceipt, PredictionRecord, PredictionRequest};
use crate::domain::query_key::ChartType;
use async_trait::async_trait;

/// Remote prediction/chart service.
///
/// Implementations classify every transport or HTTP outcome into
/// `DashboardError`; callers never see raw transport errors.
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Raw figure payload for `GET /api/chart/{symbol}?chart_type=...`.
    /// Shape validation is left to the chart adapter.
    async fn fetch_chart(
        &self,
        symbol: &str,
        chart_type: ChartType,
    ) -> Result<serde_json::Value, DashboardError>;

    async fn fetch_predictions(&self) -> Result<Vec<PredictionRecord>, DashboardError>;

    async fn submit_prediction(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionReceipt, DashboardError>;
}

/// Supplies the bearer credential. Acquisition and storage belong to the
/// collaborator behind this trait.
pub trait CredentialProvider: Send + Sync {
    /// `None` when no credential is available; requests then fail as
    /// `Unauthorized` without reaching the network.
    fn bearer_token(&self) -> Option<String>;
}
