use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Smallest stake the prediction form accepts.
pub const MIN_STAKE: Decimal = dec!(0.1);

/// Step used by the stake input.
pub const STAKE_STEP: Decimal = dec!(0.1);

/// Server-assigned prediction id. The service has emitted both integer and
/// string ids, so both are accepted and normalised to text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PredictionId(pub String);

impl<'de> Deserialize<'de> for PredictionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(id) => PredictionId(id.to_string()),
            RawId::Text(id) => PredictionId(id),
        })
    }
}

impl fmt::Display for PredictionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a prediction as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PredictionStatus {
    Pending,
    Won,
    Lost,
    Void,
    /// Preserved verbatim so one unexpected row does not fail the whole history.
    Unknown(String),
}

impl PredictionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PredictionStatus::Pending => "pending",
            PredictionStatus::Won => "won",
            PredictionStatus::Lost => "lost",
            PredictionStatus::Void => "void",
            PredictionStatus::Unknown(raw) => raw,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            PredictionStatus::Won | PredictionStatus::Lost | PredictionStatus::Void
        )
    }
}

impl From<&str> for PredictionStatus {
    fn from(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "pending" | "open" => PredictionStatus::Pending,
            "won" | "win" => PredictionStatus::Won,
            "lost" | "loss" => PredictionStatus::Lost,
            "void" | "cancelled" | "canceled" | "refunded" => PredictionStatus::Void,
            _ => PredictionStatus::Unknown(raw.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for PredictionStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(PredictionStatus::from(raw.as_str()))
    }
}

impl Serialize for PredictionStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the prediction history. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: PredictionId,
    pub symbol: String,
    pub predicted_price: f64,
    pub confidence_score: f64,
    pub status: PredictionStatus,
}

/// Body of `POST /api/predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub stake_amount: Decimal,
}

/// Created prediction returned by `POST /api/predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionReceipt {
    pub symbol: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    pub predicted_price: f64,
    #[serde(default)]
    pub predicted_change_percent: Option<f64>,
    pub confidence_score: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stake_constants() {
        assert_eq!(MIN_STAKE, dec!(0.1));
        assert_eq!(STAKE_STEP, dec!(0.1));
    }

    #[test]
    fn test_history_accepts_mixed_ids_and_statuses() {
        let body = r#"[
            {"id": 7, "symbol": "BTC-USD", "predicted_price": 65000.5, "confidence_score": 0.82, "status": "won"},
            {"id": "a1", "symbol": "ETH-USD", "predicted_price": 3100.0, "confidence_score": 0.4, "status": "settling"}
        ]"#;

        let records: Vec<PredictionRecord> = serde_json::from_str(body).unwrap();
        assert_eq!(records[0].id, PredictionId("7".into()));
        assert_eq!(records[0].status, PredictionStatus::Won);
        assert_eq!(records[1].id.to_string(), "a1");
        assert_eq!(
            records[1].status,
            PredictionStatus::Unknown("settling".into())
        );
        assert!(!records[1].status.is_settled());
    }

    #[test]
    fn test_request_serializes_stake_as_number() {
        let request = PredictionRequest {
            symbol: "ETH-USD".into(),
            stake_amount: dec!(0.1),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["symbol"], "ETH-USD");
        assert_eq!(json["stake_amount"].as_f64(), Some(0.1));
    }

    #[test]
    fn test_receipt_tolerates_missing_optional_fields() {
        let body = r#"{"symbol": "BTC-USD", "predicted_price": 64000.0, "confidence_score": 0.7}"#;
        let receipt: PredictionReceipt = serde_json::from_str(body).unwrap();
        assert_eq!(receipt.symbol, "BTC-USD");
        assert!(receipt.transaction_hash.is_none());
    }
}
