//! Session state behind the dashboard page.
//!
//! `DashboardController` is the only owner of the user's selection. It derives
//! the chart and history query keys from it, keeps one live observer per
//! section, and wires the prediction form's mutation to invalidate the history
//! key on success. It never talks to the network itself.

use crate::application::chart_adapter;
use crate::application::mutation::{MutationController, MutationState};
use crate::application::query::{
    QueryClient, QueryEntry, QueryFn, QueryObserver, QueryStatus, query_fn,
};
use crate::domain::chart::ChartFigure;
use crate::domain::errors::DashboardError;
use crate::domain::ports::PredictionService;
use crate::domain::prediction::{MIN_STAKE, PredictionReceipt, PredictionRecord, PredictionRequest};
use crate::domain::query_key::{ChartType, QueryKey};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Payload cached per query key. Shared behind `Arc` so snapshot clones stay
/// cheap for the render loop.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Chart(Arc<ChartFigure>),
    Predictions(Arc<Vec<PredictionRecord>>),
}

pub type DashboardQueries = QueryClient<QueryKey, QueryData>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub symbol: String,
    pub chart_type: ChartType,
    pub stake_amount: Decimal,
}

/// What one dashboard region should render.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionView<T> {
    /// Nothing to show yet.
    Loading,
    /// Data is available; `refreshing` while a newer fetch is in flight.
    Ready { data: T, refreshing: bool },
    Failed(DashboardError),
}

impl<T> SectionView<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, SectionView::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            SectionView::Ready { data, .. } => Some(data),
            _ => None,
        }
    }
}

/// Fetcher for every dashboard key: chart payloads pass through the chart
/// adapter so shape violations land in the entry as `MalformedPayload`.
pub fn dashboard_fetcher(service: Arc<dyn PredictionService>) -> QueryFn<QueryKey, QueryData> {
    query_fn(move |key: QueryKey| {
        let service = service.clone();
        async move {
            match key {
                QueryKey::Chart { symbol, chart_type } => {
                    let raw = service.fetch_chart(&symbol, chart_type).await?;
                    let figure = chart_adapter::adapt(&raw)?;
                    debug!(
                        symbol = %symbol,
                        chart_type = %chart_type,
                        series = figure.series.len(),
                        "Chart adapted"
                    );
                    Ok(QueryData::Chart(Arc::new(figure)))
                }
                QueryKey::Predictions => {
                    let records = service.fetch_predictions().await?;
                    Ok(QueryData::Predictions(Arc::new(records)))
                }
            }
        }
    })
}

pub struct DashboardController {
    queries: DashboardQueries,
    fetcher: QueryFn<QueryKey, QueryData>,
    runtime: Handle,
    symbols: Vec<String>,
    default_stake: Decimal,
    selection: Selection,
    chart: QueryObserver<QueryKey, QueryData>,
    history: QueryObserver<QueryKey, QueryData>,
    submission: MutationController<PredictionRequest, PredictionReceipt>,
}

impl DashboardController {
    /// Start observing the chart for the first symbol and the prediction
    /// history. `runtime` runs background submissions.
    pub fn new(
        service: Arc<dyn PredictionService>,
        queries: DashboardQueries,
        runtime: Handle,
        symbols: Vec<String>,
        default_stake: Decimal,
    ) -> Self {
        let default_stake = default_stake.max(MIN_STAKE);
        let selection = Selection {
            symbol: symbols.first().cloned().unwrap_or_else(|| "BTC-USD".to_string()),
            chart_type: ChartType::default(),
            stake_amount: default_stake,
        };

        let fetcher = dashboard_fetcher(service.clone());
        let chart = queries.subscribe(Self::chart_key_for(&selection), fetcher.clone());
        let history = queries.subscribe(QueryKey::Predictions, fetcher.clone());

        let submit_service = service.clone();
        let invalidate = queries.clone();
        let submission =
            MutationController::builder("submit_prediction", move |request: PredictionRequest| {
                let service = submit_service.clone();
                async move { service.submit_prediction(&request).await }
            })
            .on_success(move |receipt: &PredictionReceipt| {
                info!(
                    symbol = %receipt.symbol,
                    predicted_price = receipt.predicted_price,
                    "Prediction accepted, refreshing history"
                );
                invalidate.invalidate(&QueryKey::Predictions);
            })
            .build();

        info!(
            symbol = %selection.symbol,
            chart_type = %selection.chart_type,
            "DashboardController: initialized"
        );

        Self {
            queries,
            fetcher,
            runtime,
            symbols,
            default_stake,
            selection,
            chart,
            history,
            submission,
        }
    }

    fn chart_key_for(selection: &Selection) -> QueryKey {
        QueryKey::chart(selection.symbol.clone(), selection.chart_type)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn queries(&self) -> &DashboardQueries {
        &self.queries
    }

    pub fn chart_key(&self) -> QueryKey {
        Self::chart_key_for(&self.selection)
    }

    pub fn history_key(&self) -> QueryKey {
        QueryKey::Predictions
    }

    pub fn set_symbol(&mut self, symbol: impl Into<String>) {
        let symbol = symbol.into();
        if symbol == self.selection.symbol {
            return;
        }
        self.selection.symbol = symbol;
        self.resubscribe_chart();
    }

    pub fn set_chart_type(&mut self, chart_type: ChartType) {
        if chart_type == self.selection.chart_type {
            return;
        }
        self.selection.chart_type = chart_type;
        self.resubscribe_chart();
    }

    /// Amounts below the minimum stake are raised to it.
    pub fn set_stake_amount(&mut self, amount: Decimal) {
        self.selection.stake_amount = amount.max(MIN_STAKE);
    }

    fn resubscribe_chart(&mut self) {
        let key = self.chart_key();
        debug!(key = %key, "DashboardController: chart key changed");
        // The previous key's entry stays cached; only the observation moves.
        self.chart = self.queries.subscribe(key, self.fetcher.clone());
    }

    pub fn chart_entry(&self) -> QueryEntry<QueryData> {
        self.chart.current()
    }

    pub fn history_entry(&self) -> QueryEntry<QueryData> {
        self.history.current()
    }

    pub fn chart_view(&self) -> SectionView<Arc<ChartFigure>> {
        section_view(self.chart.current(), |data| match data {
            QueryData::Chart(figure) => Some(figure),
            _ => None,
        })
    }

    pub fn history_view(&self) -> SectionView<Arc<Vec<PredictionRecord>>> {
        section_view(self.history.current(), |data| match data {
            QueryData::Predictions(records) => Some(records),
            _ => None,
        })
    }

    /// Wait for the current chart and history fetches to settle.
    pub async fn settled(&mut self) -> (QueryEntry<QueryData>, QueryEntry<QueryData>) {
        let chart = self.chart.settled().await;
        let history = self.history.settled().await;
        (chart, history)
    }

    pub fn refresh(&self) {
        self.chart.refetch();
        self.history.refetch();
    }

    pub fn prediction_request(&self) -> PredictionRequest {
        PredictionRequest {
            symbol: self.selection.symbol.clone(),
            stake_amount: self.selection.stake_amount,
        }
    }

    pub fn submission_state(&self) -> MutationState<PredictionReceipt> {
        self.submission.state()
    }

    /// Submit the current selection and wait for the outcome.
    pub async fn submit_prediction(&self) -> Result<PredictionReceipt, DashboardError> {
        self.submission.submit(self.prediction_request()).await
    }

    /// Submit without blocking the caller (the render loop).
    pub fn submit_in_background(&self) -> JoinHandle<Result<PredictionReceipt, DashboardError>> {
        let submission = self.submission.clone();
        let request = self.prediction_request();
        self.runtime.spawn(async move { submission.submit(request).await })
    }

    /// Clear the form: stake back to default, submission back to idle.
    pub fn reset_form(&mut self) {
        self.selection.stake_amount = self.default_stake;
        self.submission.reset();
    }
}

fn section_view<T: Clone>(
    entry: QueryEntry<QueryData>,
    project: impl Fn(&QueryData) -> Option<&T>,
) -> SectionView<T> {
    let refreshing = entry.is_fetching();
    match (entry.status, entry.data.as_ref()) {
        (QueryStatus::Error, _) => SectionView::Failed(
            entry
                .error
                .unwrap_or_else(|| DashboardError::malformed("error without description")),
        ),
        (_, Some(data)) => match project(data) {
            Some(data) => SectionView::Ready {
                data: data.clone(),
                refreshing,
            },
            None => SectionView::Failed(DashboardError::malformed(
                "cached data does not match its query",
            )),
        },
        _ => SectionView::Loading,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::query::QueryCacheConfig;
    use crate::domain::prediction::{PredictionId, PredictionStatus};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingService {
        chart_calls: Mutex<Vec<(String, ChartType)>>,
        submitted: Mutex<Vec<PredictionRequest>>,
    }

    #[async_trait]
    impl PredictionService for RecordingService {
        async fn fetch_chart(
            &self,
            symbol: &str,
            chart_type: ChartType,
        ) -> Result<serde_json::Value, DashboardError> {
            self.chart_calls
                .lock()
                .unwrap()
                .push((symbol.to_string(), chart_type));
            Ok(json!({
                "data": [{"type": "scatter", "name": symbol, "y": [1.0, 2.0]}],
                "layout": {"title": chart_type.label()}
            }))
        }

        async fn fetch_predictions(&self) -> Result<Vec<PredictionRecord>, DashboardError> {
            Ok(self
                .submitted
                .lock()
                .unwrap()
                .iter()
                .enumerate()
                .map(|(i, r)| PredictionRecord {
                    id: PredictionId(i.to_string()),
                    symbol: r.symbol.clone(),
                    predicted_price: 100.0,
                    confidence_score: 0.8,
                    status: PredictionStatus::Pending,
                })
                .collect())
        }

        async fn submit_prediction(
            &self,
            request: &PredictionRequest,
        ) -> Result<PredictionReceipt, DashboardError> {
            self.submitted.lock().unwrap().push(request.clone());
            Ok(PredictionReceipt {
                symbol: request.symbol.clone(),
                current_price: Some(99.0),
                predicted_price: 100.0,
                predicted_change_percent: Some(1.01),
                confidence_score: 0.8,
                timestamp: None,
                transaction_hash: None,
            })
        }
    }

    fn controller(service: Arc<RecordingService>) -> DashboardController {
        DashboardController::new(
            service,
            QueryClient::spawn(QueryCacheConfig::default()),
            Handle::current(),
            vec!["BTC-USD".to_string(), "ETH-USD".to_string()],
            dec!(0.1),
        )
    }

    #[tokio::test]
    async fn test_initial_selection_and_keys() {
        let dashboard = controller(Arc::new(RecordingService::default()));
        assert_eq!(dashboard.selection().symbol, "BTC-USD");
        assert_eq!(dashboard.selection().chart_type, ChartType::Price);
        assert_eq!(
            dashboard.chart_key(),
            QueryKey::chart("BTC-USD", ChartType::Price)
        );
        assert_eq!(dashboard.history_key(), QueryKey::Predictions);
        assert!(dashboard.chart_view().is_loading());
    }

    #[tokio::test]
    async fn test_stake_below_minimum_is_clamped() {
        let mut dashboard = controller(Arc::new(RecordingService::default()));
        dashboard.set_stake_amount(dec!(0.01));
        assert_eq!(dashboard.selection().stake_amount, MIN_STAKE);
        dashboard.set_stake_amount(dec!(2.5));
        assert_eq!(dashboard.prediction_request().stake_amount, dec!(2.5));

        dashboard.reset_form();
        assert_eq!(dashboard.selection().stake_amount, dec!(0.1));
    }

    #[tokio::test]
    async fn test_selection_change_moves_chart_observation() {
        let service = Arc::new(RecordingService::default());
        let mut dashboard = controller(service.clone());
        dashboard.settled().await;

        dashboard.set_symbol("ETH-USD");
        dashboard.set_chart_type(ChartType::Technical);
        dashboard.settled().await;

        let view = dashboard.chart_view();
        let figure = view.data().expect("chart ready");
        assert_eq!(figure.series[0].name, "ETH-USD");

        let calls = service.chart_calls.lock().unwrap().clone();
        assert_eq!(calls.first(), Some(&("BTC-USD".to_string(), ChartType::Price)));
        assert!(calls.contains(&("ETH-USD".to_string(), ChartType::Technical)));
        // Earlier keys remain cached.
        assert!(
            dashboard
                .queries()
                .entry(&QueryKey::chart("BTC-USD", ChartType::Price))
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_same_selection_does_not_resubscribe() {
        let service = Arc::new(RecordingService::default());
        let mut dashboard = controller(service.clone());
        dashboard.settled().await;

        dashboard.set_symbol("BTC-USD");
        dashboard.set_chart_type(ChartType::Price);
        dashboard.settled().await;
        assert_eq!(service.chart_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_successful_submission_refreshes_history() {
        let service = Arc::new(RecordingService::default());
        let mut dashboard = controller(service.clone());
        dashboard.set_symbol("ETH-USD");
        dashboard.settled().await;
        assert_eq!(dashboard.history_view().data().map(|r| r.len()), Some(0));

        let receipt = dashboard.submit_prediction().await.unwrap();
        assert_eq!(receipt.symbol, "ETH-USD");
        assert_eq!(
            service.submitted.lock().unwrap()[0],
            PredictionRequest {
                symbol: "ETH-USD".into(),
                stake_amount: dec!(0.1),
            }
        );

        dashboard.settled().await;
        let history = dashboard.history_view();
        assert_eq!(history.data().map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_section_view_maps_entry_states() {
        let figure = Arc::new(ChartFigure {
            kind: crate::domain::chart::ChartKind::Technical,
            series: Vec::new(),
            layout: Default::default(),
        });
        fn project(data: &QueryData) -> Option<&Arc<ChartFigure>> {
            match data {
                QueryData::Chart(f) => Some(f),
                _ => None,
            }
        }

        let loading: QueryEntry<QueryData> = QueryEntry::loading();
        assert_eq!(section_view(loading, project), SectionView::Loading);

        let revalidating = QueryEntry {
            data: Some(QueryData::Chart(figure.clone())),
            in_flight: Some(crate::application::query::RequestToken(3)),
            ..QueryEntry::loading()
        };
        assert_eq!(
            section_view(revalidating, project),
            SectionView::Ready {
                data: figure,
                refreshing: true
            }
        );

        let failed = QueryEntry {
            status: QueryStatus::Error,
            error: Some(DashboardError::network("refused")),
            ..QueryEntry::idle()
        };
        assert_eq!(
            section_view(failed, project),
            SectionView::Failed(DashboardError::network("refused"))
        );
    }
}
