use predictdash::application::dashboard::{DashboardController, SectionView};
use predictdash::application::mutation::MutationStatus;
use predictdash::application::query::{QueryCacheConfig, QueryClient};
use predictdash::domain::chart::{ChartKind, TraceKind};
use predictdash::domain::errors::DashboardError;
use predictdash::domain::prediction::PredictionRequest;
use predictdash::domain::query_key::{ChartType, QueryKey};
use predictdash::infrastructure::{MockEndpoint, MockPredictionService, MockScript};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

fn dashboard(service: Arc<MockPredictionService>) -> DashboardController {
    DashboardController::new(
        service,
        QueryClient::spawn(QueryCacheConfig::default()),
        Handle::current(),
        vec!["BTC-USD".to_string(), "ETH-USD".to_string()],
        dec!(0.1),
    )
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("predictdash=debug")
        .with_test_writer()
        .try_init();
}

#[tokio::test(start_paused = true)]
async fn test_slow_price_chart_does_not_overwrite_technical_selection() {
    init_tracing();
    let service = Arc::new(MockPredictionService::instant());
    service.delay_next(MockEndpoint::Chart, Duration::from_millis(500));

    let mut dashboard = dashboard(service.clone());
    // User switches before the price chart arrives.
    dashboard.set_chart_type(ChartType::Technical);
    dashboard.settled().await;

    let figure = dashboard.chart_view().data().cloned().expect("technical chart ready");
    assert_eq!(figure.kind, ChartKind::Technical);

    tokio::time::sleep(Duration::from_secs(1)).await;

    // The late price response lands under its own key only.
    let still = dashboard.chart_view().data().cloned().expect("still ready");
    assert_eq!(still.kind, ChartKind::Technical);
    assert_eq!(dashboard.chart_key(), QueryKey::chart("BTC-USD", ChartType::Technical));

    let price_key = QueryKey::chart("BTC-USD", ChartType::Price);
    let price = dashboard.queries().entry(&price_key).expect("price key cached");
    assert!(price.data.is_some());
    assert_eq!(
        service.chart_requests(),
        vec![
            ("BTC-USD".to_string(), ChartType::Price),
            ("BTC-USD".to_string(), ChartType::Technical),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_submission_posts_selection_and_refreshes_history() {
    init_tracing();
    let service = Arc::new(MockPredictionService::instant());
    let mut dashboard = dashboard(service.clone());
    dashboard.set_symbol("ETH-USD");
    dashboard.settled().await;
    assert_eq!(service.calls(MockEndpoint::Predictions), 1);
    assert_eq!(dashboard.history_view().data().map(|h| h.len()), Some(0));

    let receipt = dashboard.submit_prediction().await.expect("accepted");
    assert_eq!(receipt.symbol, "ETH-USD");
    assert!(receipt.transaction_hash.is_some_and(|h| h.starts_with("0x")));
    assert_eq!(
        service.submitted(),
        vec![PredictionRequest {
            symbol: "ETH-USD".into(),
            stake_amount: dec!(0.1),
        }]
    );

    let (_, history) = dashboard.settled().await;
    assert!(history.data.is_some());
    assert_eq!(service.calls(MockEndpoint::Predictions), 2);
    let records = dashboard.history_view().data().cloned().expect("history ready");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].symbol, "ETH-USD");
    assert_eq!(dashboard.submission_state().status, MutationStatus::Success);

    // A refresh picks up the prediction overlay on the price chart.
    dashboard.refresh();
    dashboard.settled().await;
    let figure = dashboard.chart_view().data().cloned().expect("chart ready");
    assert!(
        figure
            .series
            .iter()
            .any(|s| s.name == "Predictions" && s.kind == TraceKind::Scatter)
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_submission_leaves_history_alone() {
    init_tracing();
    let service = Arc::new(MockPredictionService::instant());
    let mut dashboard = dashboard(service.clone());
    dashboard.settled().await;

    service.fail_next(MockEndpoint::Predict, DashboardError::network("connection refused"));
    let error = dashboard.submit_prediction().await.unwrap_err();
    assert_eq!(error, DashboardError::network("connection refused"));

    let state = dashboard.submission_state();
    assert_eq!(state.status, MutationStatus::Error);
    assert_eq!(state.error, Some(error));

    dashboard.settled().await;
    assert_eq!(service.calls(MockEndpoint::Predictions), 1);

    dashboard.reset_form();
    assert_eq!(dashboard.submission_state().status, MutationStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_second_submit_while_pending_is_rejected() {
    init_tracing();
    let service = Arc::new(MockPredictionService::instant());
    service.delay_next(MockEndpoint::Predict, Duration::from_secs(2));
    let dashboard = dashboard(service.clone());

    let background = dashboard.submit_in_background();
    while !dashboard.submission_state().is_pending() {
        tokio::task::yield_now().await;
    }

    let rejected = dashboard.submit_prediction().await;
    assert_eq!(rejected.unwrap_err(), DashboardError::AlreadyPending);

    let receipt = background.await.expect("task joined").expect("accepted");
    assert_eq!(receipt.symbol, "BTC-USD");
    assert_eq!(service.submitted().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_chart_fails_only_the_chart_section() {
    init_tracing();
    let service = Arc::new(MockPredictionService::instant());
    service.script(
        MockEndpoint::Chart,
        MockScript::Payload(json!({"data": [{"type": "scatter", "y": [1, 2]}]})),
    );

    let mut dashboard = dashboard(service.clone());
    dashboard.settled().await;

    match dashboard.chart_view() {
        SectionView::Failed(DashboardError::MalformedPayload { reason }) => {
            assert!(reason.contains("layout"));
        }
        other => panic!("expected malformed chart, got {:?}", other),
    }
    assert!(matches!(dashboard.history_view(), SectionView::Ready { .. }));

    // Refresh recovers once the service sends a proper figure.
    dashboard.refresh();
    dashboard.settled().await;
    assert!(dashboard.chart_view().data().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_history_surfaces_inline() {
    init_tracing();
    let service = Arc::new(MockPredictionService::instant());
    service.fail_next(
        MockEndpoint::Predictions,
        DashboardError::Unauthorized {
            reason: "token expired".into(),
        },
    );

    let mut dashboard = dashboard(service);
    dashboard.settled().await;

    match dashboard.history_view() {
        SectionView::Failed(error) => {
            assert_eq!(error.user_message(), "Not authorized, sign in again");
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(dashboard.chart_view().data().is_some());
}
