//! Declarative figure description consumed by the rendering surface.
//!
//! A `ChartFigure` is derived purely from a chart query's payload by the chart
//! adapter and is never mutated afterwards.

use serde::{Deserialize, Serialize};

/// Chart family, inferred from the payload's own structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartKind {
    /// OHLC candles, optionally with volume and prediction overlays.
    Price,
    /// Line indicators (moving averages, oscillators) over one or more panels.
    Technical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceKind {
    Candlestick,
    Bar,
    Scatter,
    /// Trace type the renderer has no drawing for; kept so series count stays
    /// aligned with the payload.
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineDash {
    Solid,
    Dot,
    Dash,
}

/// One trace descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub kind: TraceKind,
    /// Zero-based sub-panel, resolved from the trace's y-axis reference
    /// (`y` is panel 0, `y2` panel 1, ...).
    pub panel: usize,
    /// `[x, y]` points. Candlesticks carry their close here.
    pub points: Vec<[f64; 2]>,
    /// Only present for candlestick traces, aligned with `points`.
    pub candles: Option<Vec<Ohlc>>,
    pub color: Option<String>,
    pub dash: LineDash,
    pub show_markers: bool,
}

impl Series {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FigureLayout {
    pub title: Option<String>,
    pub height: Option<f32>,
    /// Number of vertically stacked panels the series reference (at least 1).
    pub panel_count: usize,
    /// Title per panel, from subplot annotations or y-axis titles.
    pub panel_titles: Vec<Option<String>>,
    /// Whether x values are unix timestamps (seconds) rather than plain numbers.
    pub time_axis: bool,
}

impl FigureLayout {
    pub fn panel_title(&self, panel: usize) -> Option<&str> {
        self.panel_titles.get(panel).and_then(|t| t.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartFigure {
    pub kind: ChartKind,
    pub series: Vec<Series>,
    pub layout: FigureLayout,
}

impl ChartFigure {
    pub fn series_in_panel(&self, panel: usize) -> impl Iterator<Item = &Series> {
        self.series.iter().filter(move |s| s.panel == panel)
    }

    /// Panels that share the x axis but need their own y axis.
    pub fn has_overlay_axes(&self) -> bool {
        self.layout.panel_count > 1
    }
}
