use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which figure the chart endpoint should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Price,
    Technical,
}

impl ChartType {
    pub const ALL: [ChartType; 2] = [ChartType::Price, ChartType::Technical];

    /// Value of the `chart_type` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Price => "price",
            ChartType::Technical => "technical",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChartType::Price => "Price Chart",
            ChartType::Technical => "Technical Indicators",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "price" => Ok(ChartType::Price),
            "technical" => Ok(ChartType::Technical),
            _ => bail!("Invalid chart type: {}. Must be 'price' or 'technical'", s),
        }
    }
}

/// Identity of a cacheable fetch. Equality and hashing are structural, so two
/// keys built from the same parameters name the same logical query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Chart { symbol: String, chart_type: ChartType },
    Predictions,
}

impl QueryKey {
    pub fn chart(symbol: impl Into<String>, chart_type: ChartType) -> Self {
        QueryKey::Chart {
            symbol: symbol.into(),
            chart_type,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueryKey::Chart { .. } => "chart",
            QueryKey::Predictions => "predictions",
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Chart { symbol, chart_type } => write!(f, "chart/{}/{}", symbol, chart_type),
            QueryKey::Predictions => f.write_str("predictions"),
        }
    }
}
