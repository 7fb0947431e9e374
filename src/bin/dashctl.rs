//! dashctl - headless access to the prediction service
//!
//! Goes through the same service port and chart adapter as the dashboard, so
//! it doubles as a smoke test against a live deployment.
//!
//! # Usage
//! ```sh
//! dashctl chart BTC-USD --chart-type technical
//! dashctl predictions
//! dashctl predict ETH-USD --stake 0.1
//! DASHBOARD_MODE=mock dashctl chart ETH-USD --json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use predictdash::application::chart_adapter;
use predictdash::application::system::build_service;
use predictdash::config::{Config, Mode};
use predictdash::domain::chart::ChartFigure;
use predictdash::domain::prediction::{MIN_STAKE, PredictionRequest};
use predictdash::domain::query_key::ChartType;
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about = "Query the prediction service from the command line")]
struct Args {
    /// Use in-process mock data regardless of DASHBOARD_MODE
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and adapt a chart figure
    Chart {
        symbol: String,
        #[arg(long, default_value = "price")]
        chart_type: ChartType,
        /// Print the adapted figure as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the prediction history
    Predictions,
    /// Submit a prediction
    Predict {
        symbol: String,
        #[arg(long, default_value = "0.1")]
        stake: Decimal,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = Config::from_env()?;
    if args.mock {
        config.mode = Mode::Mock;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.observability.log_filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    info!("dashctl {} (mode: {:?})", env!("CARGO_PKG_VERSION"), config.mode);
    let service = build_service(&config)?;

    match args.command {
        Command::Chart {
            symbol,
            chart_type,
            json,
        } => {
            let symbol = symbol.to_uppercase();
            let raw = service
                .fetch_chart(&symbol, chart_type)
                .await
                .with_context(|| format!("chart request for {} failed", symbol))?;
            let figure = chart_adapter::adapt(&raw).context("chart payload rejected")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&figure)?);
            } else {
                print_figure(&symbol, chart_type, &figure);
            }
        }
        Command::Predictions => {
            let records = service
                .fetch_predictions()
                .await
                .context("prediction history request failed")?;
            if records.is_empty() {
                println!("No predictions yet");
            }
            for record in records {
                println!(
                    "{:>8}  {:<10} {:>14.2}  {:>6.1}%  {}",
                    record.id.to_string(),
                    record.symbol,
                    record.predicted_price,
                    record.confidence_score * 100.0,
                    record.status
                );
            }
        }
        Command::Predict { symbol, stake } => {
            if stake < MIN_STAKE {
                anyhow::bail!("stake must be at least {}", MIN_STAKE);
            }
            let request = PredictionRequest {
                symbol: symbol.to_uppercase(),
                stake_amount: stake,
            };
            let receipt = service
                .submit_prediction(&request)
                .await
                .context("prediction submission failed")?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
    }

    Ok(())
}

fn print_figure(symbol: &str, chart_type: ChartType, figure: &ChartFigure) {
    println!(
        "{} {} chart: {:?}, {} panel(s){}",
        symbol,
        chart_type,
        figure.kind,
        figure.layout.panel_count,
        figure
            .layout
            .title
            .as_ref()
            .map(|t| format!(", \"{}\"", t))
            .unwrap_or_default()
    );
    for series in &figure.series {
        let last = series
            .points
            .last()
            .map(|[_, y]| format!("{:.2}", y))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  [panel {}] {:<16} {:?} points={} last={}",
            series.panel,
            series.name,
            series.kind,
            series.len(),
            last
        );
    }
}
