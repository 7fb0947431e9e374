//! In-process prediction service for demos, the CLI and tests.
//!
//! Prices follow a seeded random walk per symbol, so the same symbol always
//! yields the same history. Charts are emitted in the same figure-document
//! shape (and double encoding) as the real service. Latency and failures can
//! be scripted per endpoint.

use crate::domain::errors::DashboardError;
use crate::domain::ports::PredictionService;
use crate::domain::prediction::{
    MIN_STAKE, PredictionId, PredictionReceipt, PredictionRecord, PredictionRequest,
    PredictionStatus,
};
use crate::domain::query_key::ChartType;
use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use ta::Next;
use ta::indicators::{
    MovingAverageConvergenceDivergence, RelativeStrengthIndex, SimpleMovingAverage,
};
use tracing::{debug, info};

const SMA_PERIOD: usize = 20;
const RSI_PERIOD: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockEndpoint {
    Chart,
    Predictions,
    Predict,
}

/// One scripted reaction, consumed by the next call to its endpoint.
#[derive(Debug, Clone)]
pub enum MockScript {
    /// Answer normally after the given delay.
    Delay(Duration),
    /// Fail with the given error.
    Fail(DashboardError),
    /// Return this raw chart payload (chart endpoint only).
    Payload(Value),
}

#[derive(Debug, Clone)]
pub struct MockSettings {
    /// Delay applied to every call without a scripted one.
    pub latency: Duration,
    /// Number of daily bars per symbol.
    pub bars: usize,
    pub seed: u64,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(250),
            bars: 120,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct MockPredictionService {
    settings: MockSettings,
    bars: Mutex<HashMap<String, Vec<Bar>>>,
    history: Mutex<Vec<PredictionRecord>>,
    rng: Mutex<StdRng>,
    scripts: Mutex<HashMap<MockEndpoint, VecDeque<MockScript>>>,
    calls: Mutex<HashMap<MockEndpoint, usize>>,
    chart_requests: Mutex<Vec<(String, ChartType)>>,
    submitted: Mutex<Vec<PredictionRequest>>,
    next_id: AtomicU64,
}

impl MockPredictionService {
    pub fn new(settings: MockSettings) -> Self {
        info!(
            "MockPredictionService: {} bars per symbol, latency {:?}",
            settings.bars, settings.latency
        );
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(settings.seed)),
            settings,
            bars: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            chart_requests: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// No artificial latency; for tests.
    pub fn instant() -> Self {
        Self::new(MockSettings {
            latency: Duration::ZERO,
            ..MockSettings::default()
        })
    }

    pub fn script(&self, endpoint: MockEndpoint, script: MockScript) {
        lock(&self.scripts)
            .entry(endpoint)
            .or_default()
            .push_back(script);
    }

    pub fn fail_next(&self, endpoint: MockEndpoint, error: DashboardError) {
        self.script(endpoint, MockScript::Fail(error));
    }

    pub fn delay_next(&self, endpoint: MockEndpoint, delay: Duration) {
        self.script(endpoint, MockScript::Delay(delay));
    }

    pub fn calls(&self, endpoint: MockEndpoint) -> usize {
        lock(&self.calls).get(&endpoint).copied().unwrap_or(0)
    }

    pub fn chart_requests(&self) -> Vec<(String, ChartType)> {
        lock(&self.chart_requests).clone()
    }

    pub fn submitted(&self) -> Vec<PredictionRequest> {
        lock(&self.submitted).clone()
    }

    /// Count the call, then apply its script (or the default latency).
    /// Returns a scripted payload, if any.
    async fn enter(&self, endpoint: MockEndpoint) -> Result<Option<Value>, DashboardError> {
        *lock(&self.calls).entry(endpoint).or_insert(0) += 1;
        let script = lock(&self.scripts)
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front);

        match script {
            Some(MockScript::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(None)
            }
            Some(MockScript::Fail(error)) => {
                tokio::time::sleep(self.settings.latency).await;
                debug!(?endpoint, "MockPredictionService: scripted failure");
                Err(error)
            }
            Some(MockScript::Payload(payload)) => {
                tokio::time::sleep(self.settings.latency).await;
                Ok(Some(payload))
            }
            None => {
                if !self.settings.latency.is_zero() {
                    tokio::time::sleep(self.settings.latency).await;
                }
                Ok(None)
            }
        }
    }

    fn bars_for(&self, symbol: &str) -> Vec<Bar> {
        lock(&self.bars)
            .entry(symbol.to_string())
            .or_insert_with(|| random_walk(symbol, self.settings.seed, self.settings.bars))
            .clone()
    }

    fn price_figure(&self, symbol: &str, bars: &[Bar]) -> Value {
        let dates: Vec<String> = bars.iter().map(|b| b.date.to_string()).collect();
        let mut data = vec![
            json!({
                "type": "candlestick",
                "name": "OHLC",
                "x": dates,
                "open": bars.iter().map(|b| b.open).collect::<Vec<_>>(),
                "high": bars.iter().map(|b| b.high).collect::<Vec<_>>(),
                "low": bars.iter().map(|b| b.low).collect::<Vec<_>>(),
                "close": bars.iter().map(|b| b.close).collect::<Vec<_>>(),
                "xaxis": "x",
                "yaxis": "y"
            }),
            json!({
                "type": "bar",
                "name": "Volume",
                "x": dates,
                "y": bars.iter().map(|b| b.volume).collect::<Vec<_>>(),
                "xaxis": "x2",
                "yaxis": "y2"
            }),
        ];

        let next_day = bars
            .last()
            .and_then(|b| b.date.checked_add_days(Days::new(1)))
            .map(|d| d.to_string());
        let predicted: Vec<f64> = lock(&self.history)
            .iter()
            .filter(|r| r.symbol == symbol)
            .map(|r| r.predicted_price)
            .collect();
        if let (Some(next_day), false) = (next_day, predicted.is_empty()) {
            data.push(json!({
                "type": "scatter",
                "mode": "markers+lines",
                "name": "Predictions",
                "x": vec![next_day; predicted.len()],
                "y": predicted,
                "line": {"color": "red", "dash": "dot"},
                "xaxis": "x",
                "yaxis": "y"
            }));
        }

        json!({
            "data": data,
            "layout": {
                "title": {"text": "Market Price and Predictions"},
                "annotations": [{"text": "Price"}, {"text": "Volume"}],
                "yaxis": {"title": {"text": "Price"}},
                "yaxis2": {"title": {"text": "Volume"}},
                "xaxis": {"rangeslider": {"visible": false}}
            }
        })
    }

    fn technical_figure(bars: &[Bar]) -> Result<Value, DashboardError> {
        let mut sma = SimpleMovingAverage::new(SMA_PERIOD).map_err(indicator_error)?;
        let mut rsi = RelativeStrengthIndex::new(RSI_PERIOD).map_err(indicator_error)?;
        let mut macd =
            MovingAverageConvergenceDivergence::new(12, 26, 9).map_err(indicator_error)?;

        let mut sma_values = Vec::with_capacity(bars.len());
        let mut rsi_values = Vec::with_capacity(bars.len());
        let mut macd_values = Vec::with_capacity(bars.len());
        let mut signal_values = Vec::with_capacity(bars.len());
        for (i, bar) in bars.iter().enumerate() {
            let average = sma.next(bar.close);
            // Rolling windows have no value until they are full.
            sma_values.push((i + 1 >= SMA_PERIOD).then_some(average));
            rsi_values.push(rsi.next(bar.close));
            let output = macd.next(bar.close);
            macd_values.push(output.macd);
            signal_values.push(output.signal);
        }

        let dates: Vec<String> = bars.iter().map(|b| b.date.to_string()).collect();
        let line = |name: &str, values: Value, axis: usize| {
            let suffix = if axis == 1 { String::new() } else { axis.to_string() };
            json!({
                "type": "scatter",
                "name": name,
                "x": dates,
                "y": values,
                "xaxis": format!("x{}", suffix),
                "yaxis": format!("y{}", suffix)
            })
        };

        Ok(json!({
            "data": [
                line("Close", json!(bars.iter().map(|b| b.close).collect::<Vec<_>>()), 1),
                line("SMA 20", json!(sma_values), 1),
                line("RSI", json!(rsi_values), 2),
                line("MACD", json!(macd_values), 3),
                line("Signal Line", json!(signal_values), 3),
            ],
            "layout": {
                "title": {"text": "Technical Indicators"},
                "height": 900,
                "annotations": [{"text": "Price & MA"}, {"text": "RSI"}, {"text": "MACD"}]
            }
        }))
    }

    /// Settle every open prediction for `symbol` against the latest close.
    fn settle_open_predictions(&self, symbol: &str, close: f64) {
        let mut history = lock(&self.history);
        for record in history
            .iter_mut()
            .filter(|r| r.symbol == symbol && r.status == PredictionStatus::Pending)
        {
            let miss = (record.predicted_price - close).abs() / close;
            record.status = if miss <= 0.01 {
                PredictionStatus::Won
            } else {
                PredictionStatus::Lost
            };
        }
    }
}

impl Default for MockPredictionService {
    fn default() -> Self {
        Self::new(MockSettings::default())
    }
}

#[async_trait]
impl PredictionService for MockPredictionService {
    async fn fetch_chart(
        &self,
        symbol: &str,
        chart_type: ChartType,
    ) -> Result<Value, DashboardError> {
        lock(&self.chart_requests).push((symbol.to_string(), chart_type));
        if let Some(payload) = self.enter(MockEndpoint::Chart).await? {
            return Ok(payload);
        }

        let bars = self.bars_for(symbol);
        let figure = match chart_type {
            ChartType::Price => self.price_figure(symbol, &bars),
            ChartType::Technical => Self::technical_figure(&bars)?,
        };
        // The real service returns the figure's JSON text as a JSON string.
        Ok(Value::String(figure.to_string()))
    }

    async fn fetch_predictions(&self) -> Result<Vec<PredictionRecord>, DashboardError> {
        self.enter(MockEndpoint::Predictions).await?;
        Ok(lock(&self.history).clone())
    }

    async fn submit_prediction(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionReceipt, DashboardError> {
        lock(&self.submitted).push(request.clone());
        self.enter(MockEndpoint::Predict).await?;

        if request.stake_amount < MIN_STAKE {
            return Err(DashboardError::ServerError {
                status: 422,
                message: format!("stake_amount must be at least {}", MIN_STAKE),
            });
        }

        let current_price = self
            .bars_for(&request.symbol)
            .last()
            .map(|b| b.close)
            .ok_or_else(|| DashboardError::ServerError {
                status: 500,
                message: format!("no market data for {}", request.symbol),
            })?;
        self.settle_open_predictions(&request.symbol, current_price);

        let (change, confidence, hash) = {
            let mut rng = lock(&self.rng);
            let change: f64 = rng.random_range(-0.03..0.03);
            let confidence: f64 = rng.random_range(0.55..0.95);
            let hash = format!(
                "0x{:016x}{:016x}{:016x}{:016x}",
                rng.random::<u64>(),
                rng.random::<u64>(),
                rng.random::<u64>(),
                rng.random::<u64>()
            );
            (change, confidence, hash)
        };
        let predicted_price = current_price * (1.0 + change);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        lock(&self.history).push(PredictionRecord {
            id: PredictionId(id.to_string()),
            symbol: request.symbol.clone(),
            predicted_price,
            confidence_score: confidence,
            status: PredictionStatus::Pending,
        });
        info!(
            symbol = %request.symbol,
            stake = %request.stake_amount,
            id,
            "MockPredictionService: prediction recorded"
        );

        Ok(PredictionReceipt {
            symbol: request.symbol.clone(),
            current_price: Some(current_price),
            predicted_price,
            predicted_change_percent: Some(change * 100.0),
            confidence_score: confidence,
            timestamp: Some(Utc::now().to_rfc3339()),
            transaction_hash: Some(hash),
        })
    }
}

fn indicator_error(e: impl std::fmt::Display) -> DashboardError {
    DashboardError::ServerError {
        status: 500,
        message: format!("indicator setup failed: {}", e),
    }
}

/// Poisoning only follows a panic in another holder; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn base_price(symbol: &str) -> f64 {
    if symbol.contains("BTC") {
        96_000.0
    } else if symbol.contains("ETH") {
        3_400.0
    } else if symbol.contains("SOL") {
        180.0
    } else {
        150.0
    }
}

fn random_walk(symbol: &str, seed: u64, count: usize) -> Vec<Bar> {
    let symbol_seed = symbol
        .bytes()
        .fold(seed, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    let mut rng = StdRng::seed_from_u64(symbol_seed);

    let today = Utc::now().date_naive();
    let start = today
        .checked_sub_days(Days::new(count as u64))
        .unwrap_or(today);
    let mut close = base_price(symbol);
    let base_volume = 1_000_000.0 / close.sqrt();

    (0..count)
        .map(|i| {
            let open = close;
            close = (open * (1.0 + rng.random_range(-0.025..0.025))).max(0.01);
            let wick = open.max(close) * rng.random_range(0.0..0.01);
            let tail = open.min(close) * rng.random_range(0.0..0.01);
            Bar {
                date: start
                    .checked_add_days(Days::new(i as u64))
                    .unwrap_or(start),
                open,
                high: open.max(close) + wick,
                low: (open.min(close) - tail).max(0.0),
                close,
                volume: base_volume * rng.random_range(0.5..1.5),
            }
        })
        .collect()
}
