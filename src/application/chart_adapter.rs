//! Converts the chart endpoint's figure document into a `ChartFigure`.
//!
//! The service returns a plotting-library figure: `{ "data": [traces...],
//! "layout": {...} }`, sometimes double-encoded as a JSON string. Each trace
//! is validated against the fields its own `type` requires before use, and the
//! chart kind, panel count and axis titles are inferred from the document, so
//! callers never branch on price vs technical.

use crate::domain::chart::{
    ChartFigure, ChartKind, FigureLayout, LineDash, Ohlc, Series, TraceKind,
};
use crate::domain::errors::DashboardError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Trace as declared by the payload, tagged by its `type`.
#[derive(Debug)]
enum Trace {
    Candlestick(CandlestickTrace),
    Bar(XyTrace),
    Scatter(XyTrace),
    Other { kind: String, common: TraceCommon },
}

#[derive(Debug, Default, Deserialize)]
struct TraceCommon {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    yaxis: Option<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    line: Option<LineStyle>,
    #[serde(default)]
    marker: Option<MarkerStyle>,
}

#[derive(Debug, Default, Deserialize)]
struct LineStyle {
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    dash: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MarkerStyle {
    #[serde(default)]
    color: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CandlestickTrace {
    x: Vec<Value>,
    open: Vec<Value>,
    high: Vec<Value>,
    low: Vec<Value>,
    close: Vec<Value>,
    #[serde(flatten)]
    common: TraceCommon,
}

#[derive(Debug, Deserialize)]
struct XyTrace {
    #[serde(default)]
    x: Option<Vec<Value>>,
    y: Vec<Value>,
    #[serde(flatten)]
    common: TraceCommon,
}

/// Adapt a raw chart payload. Fails with `MalformedPayload` when `data` or
/// `layout` is missing or a trace lacks the fields its type requires.
pub fn adapt(raw: &Value) -> Result<ChartFigure, DashboardError> {
    // Figure libraries' `to_json()` output is sometimes returned as a string.
    let decoded;
    let document = match raw {
        Value::String(text) => {
            decoded = serde_json::from_str::<Value>(text).map_err(|e| {
                DashboardError::malformed(format!("chart payload is not valid JSON: {}", e))
            })?;
            &decoded
        }
        other => other,
    };

    let object = document
        .as_object()
        .ok_or_else(|| DashboardError::malformed("chart payload is not an object"))?;
    let data = object
        .get("data")
        .ok_or_else(|| DashboardError::malformed("chart payload is missing `data`"))?
        .as_array()
        .ok_or_else(|| DashboardError::malformed("chart `data` is not an array"))?;
    let layout = object
        .get("layout")
        .ok_or_else(|| DashboardError::malformed("chart payload is missing `layout`"))?
        .as_object()
        .ok_or_else(|| DashboardError::malformed("chart `layout` is not an object"))?;

    let traces = data
        .iter()
        .enumerate()
        .map(|(i, trace)| parse_trace(i, trace))
        .collect::<Result<Vec<_>, _>>()?;

    let time_axis = traces.iter().any(trace_has_time_axis);
    let series: Vec<Series> = traces
        .into_iter()
        .enumerate()
        .map(|(i, trace)| to_series(i, trace))
        .collect::<Result<_, _>>()?;

    let kind = if series.iter().any(|s| s.kind == TraceKind::Candlestick) {
        ChartKind::Price
    } else {
        ChartKind::Technical
    };

    let panel_count = series.iter().map(|s| s.panel + 1).max().unwrap_or(1);
    let layout = FigureLayout {
        title: title_text(layout.get("title")),
        height: layout
            .get("height")
            .and_then(Value::as_f64)
            .map(|h| h as f32),
        panel_count,
        panel_titles: panel_titles(layout, panel_count),
        time_axis,
    };

    Ok(ChartFigure {
        kind,
        series,
        layout,
    })
}

fn parse_trace(index: usize, value: &Value) -> Result<Trace, DashboardError> {
    let malformed = |e: serde_json::Error| {
        DashboardError::malformed(format!("trace {} is invalid: {}", index, e))
    };

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        // Traces without a type default to scatter in the figure format.
        .unwrap_or("scatter");

    Ok(match kind {
        "candlestick" | "ohlc" => {
            Trace::Candlestick(CandlestickTrace::deserialize(value).map_err(malformed)?)
        }
        "bar" => Trace::Bar(XyTrace::deserialize(value).map_err(malformed)?),
        "scatter" | "scattergl" => Trace::Scatter(XyTrace::deserialize(value).map_err(malformed)?),
        other => Trace::Other {
            kind: other.to_string(),
            common: TraceCommon::deserialize(value).unwrap_or_default(),
        },
    })
}

fn trace_has_time_axis(trace: &Trace) -> bool {
    let x = match trace {
        Trace::Candlestick(t) => Some(&t.x),
        Trace::Bar(t) | Trace::Scatter(t) => t.x.as_ref(),
        Trace::Other { .. } => None,
    };
    x.and_then(|x| x.first()).is_some_and(Value::is_string)
}

fn to_series(index: usize, trace: Trace) -> Result<Series, DashboardError> {
    match trace {
        Trace::Candlestick(t) => {
            let len = t.x.len();
            if [t.open.len(), t.high.len(), t.low.len(), t.close.len()]
                .iter()
                .any(|&l| l != len)
            {
                return Err(DashboardError::malformed(format!(
                    "trace {}: candlestick arrays differ in length",
                    index
                )));
            }

            let mut points = Vec::with_capacity(len);
            let mut candles = Vec::with_capacity(len);
            for i in 0..len {
                let (Some(x), Some(open), Some(high), Some(low), Some(close)) = (
                    x_value(&t.x[i], i),
                    number(&t.open[i]),
                    number(&t.high[i]),
                    number(&t.low[i]),
                    number(&t.close[i]),
                ) else {
                    // Gaps (nulls) are skipped rather than drawn at zero.
                    continue;
                };
                points.push([x, close]);
                candles.push(Ohlc {
                    open,
                    high,
                    low,
                    close,
                });
            }

            Ok(Series {
                name: series_name(&t.common, index),
                kind: TraceKind::Candlestick,
                panel: panel_index(t.common.yaxis.as_deref()),
                points,
                candles: Some(candles),
                color: None,
                dash: LineDash::Solid,
                show_markers: false,
            })
        }
        Trace::Bar(t) => xy_series(index, TraceKind::Bar, t),
        Trace::Scatter(t) => xy_series(index, TraceKind::Scatter, t),
        Trace::Other { kind, common } => Ok(Series {
            name: series_name(&common, index),
            kind: TraceKind::Other(kind),
            panel: panel_index(common.yaxis.as_deref()),
            points: Vec::new(),
            candles: None,
            color: None,
            dash: LineDash::Solid,
            show_markers: false,
        }),
    }
}

fn xy_series(index: usize, kind: TraceKind, trace: XyTrace) -> Result<Series, DashboardError> {
    if let Some(x) = &trace.x
        && x.len() != trace.y.len()
    {
        return Err(DashboardError::malformed(format!(
            "trace {}: x has {} values but y has {}",
            index,
            x.len(),
            trace.y.len()
        )));
    }

    let points = trace
        .y
        .iter()
        .enumerate()
        .filter_map(|(i, y)| {
            let x = match &trace.x {
                Some(xs) => x_value(&xs[i], i)?,
                None => i as f64,
            };
            Some([x, number(y)?])
        })
        .collect();

    let common = &trace.common;
    let color = common
        .line
        .as_ref()
        .and_then(|l| l.color.clone())
        .or_else(|| {
            common
                .marker
                .as_ref()
                .and_then(|m| m.color.as_ref())
                .and_then(|c| c.as_str().map(str::to_string))
        });
    let dash = match common.line.as_ref().and_then(|l| l.dash.as_deref()) {
        Some("dot") => LineDash::Dot,
        Some("dash") | Some("dashdot") | Some("longdash") => LineDash::Dash,
        _ => LineDash::Solid,
    };
    let show_markers = common.mode.as_deref().is_some_and(|m| m.contains("markers"));

    Ok(Series {
        name: series_name(common, index),
        kind,
        panel: panel_index(common.yaxis.as_deref()),
        points,
        candles: None,
        color,
        dash,
        show_markers,
    })
}

fn series_name(common: &TraceCommon, index: usize) -> String {
    common
        .name
        .clone()
        .unwrap_or_else(|| format!("trace {}", index))
}

/// `y` -> 0, `y2` -> 1, `y3` -> 2.
fn panel_index(axis: Option<&str>) -> usize {
    axis.and_then(|a| a.strip_prefix('y'))
        .and_then(|n| if n.is_empty() { Some(1) } else { n.parse::<usize>().ok() })
        .map_or(0, |n| n.saturating_sub(1))
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite())
}

/// Numeric x values pass through; timestamps become unix seconds; anything
/// else falls back to its position.
fn x_value(value: &Value, position: usize) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(parse_timestamp(s).unwrap_or(position as f64)),
        Value::Null => None,
        _ => Some(position as f64),
    }
}

fn parse_timestamp(raw: &str) -> Option<f64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp() as f64);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc().timestamp() as f64);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp() as f64)
}

/// Titles are either plain strings or `{ "text": ... }` objects.
fn title_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("text").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Subplot titles arrive as layout annotations in panel order; fall back to
/// the y-axis titles (`yaxis`, `yaxis2`, ...).
fn panel_titles(layout: &Map<String, Value>, panel_count: usize) -> Vec<Option<String>> {
    let annotations: Vec<String> = layout
        .get("annotations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|a| a.get("text").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    (0..panel_count)
        .map(|panel| {
            if let Some(text) = annotations.get(panel) {
                return Some(text.clone());
            }
            let axis_key = if panel == 0 {
                "yaxis".to_string()
            } else {
                format!("yaxis{}", panel + 1)
            };
            title_text(layout.get(&axis_key).and_then(|axis| axis.get("title")))
        })
        .collect()
}
