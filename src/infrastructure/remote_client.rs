//! HTTP implementation of the prediction service port.
//!
//! Every outcome is classified into `DashboardError` here: no response
//! (connect failure, timeout) is a `NetworkError`, 401/403 is `Unauthorized`,
//! any other non-2xx is a `ServerError` carrying the service's `detail`, and a
//! body that does not decode is `MalformedPayload`.

use crate::config::ApiEnvConfig;
use crate::domain::errors::DashboardError;
use crate::domain::ports::{CredentialProvider, PredictionService};
use crate::domain::prediction::{PredictionReceipt, PredictionRecord, PredictionRequest};
use crate::domain::query_key::ChartType;
use crate::infrastructure::core::HttpClientFactory;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

const MAX_ERROR_BODY_CHARS: usize = 200;

pub struct HttpPredictionService {
    client: ClientWithMiddleware,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpPredictionService {
    pub fn new(api: &ApiEnvConfig, credentials: Arc<dyn CredentialProvider>) -> anyhow::Result<Self> {
        let base_url = Url::parse(&api.base_url)
            .with_context(|| format!("Invalid DASHBOARD_API_BASE_URL: {}", api.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("DASHBOARD_API_BASE_URL must be an http(s) URL: {}", api.base_url);
        }

        Ok(Self {
            client: HttpClientFactory::create_client(api),
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `base_url` + `/api/<segments...>`, each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, DashboardError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DashboardError::malformed("base URL cannot carry a path"))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, DashboardError> {
        let token = self
            .credentials
            .bearer_token()
            .ok_or_else(|| DashboardError::Unauthorized {
                reason: "no bearer credential available".to_string(),
            })?;
        Ok(request.header(AUTHORIZATION, format!("Bearer {}", token)))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T, DashboardError> {
        let request = self.authorize(request)?;

        let response = request.send().await.map_err(|e| {
            let error = classify_transport(e);
            warn!(endpoint, "Request failed without response: {}", error);
            error
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            DashboardError::network(format!("failed to read response body: {}", e))
        })?;
        debug!(endpoint, status = status.as_u16(), bytes = body.len(), "Response received");

        if !status.is_success() {
            let error = classify_status(status.as_u16(), &body);
            warn!(endpoint, status = status.as_u16(), "Request rejected: {}", error);
            return Err(error);
        }

        serde_json::from_str(&body).map_err(|e| {
            DashboardError::malformed(format!("{} response did not decode: {}", endpoint, e))
        })
    }
}

#[async_trait]
impl PredictionService for HttpPredictionService {
    async fn fetch_chart(
        &self,
        symbol: &str,
        chart_type: ChartType,
    ) -> Result<serde_json::Value, DashboardError> {
        let mut url = self.endpoint(&["chart", symbol])?;
        // reqwest-middleware's builder has no `.query()`, so the query goes on the URL.
        url.query_pairs_mut().append_pair("chart_type", chart_type.as_str());

        self.execute(self.client.get(url), "GET /api/chart").await
    }

    async fn fetch_predictions(&self) -> Result<Vec<PredictionRecord>, DashboardError> {
        let url = self.endpoint(&["predictions"])?;
        self.execute(self.client.get(url), "GET /api/predictions").await
    }

    async fn submit_prediction(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionReceipt, DashboardError> {
        let url = self.endpoint(&["predict"])?;
        let body = serde_json::to_string(request)
            .map_err(|e| DashboardError::malformed(format!("request did not encode: {}", e)))?;

        let builder = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        self.execute(builder, "POST /api/predict").await
    }
}

fn classify_transport(error: reqwest_middleware::Error) -> DashboardError {
    match error {
        reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => {
            DashboardError::network(format!("request timed out: {}", e))
        }
        reqwest_middleware::Error::Reqwest(e) if e.is_connect() => {
            DashboardError::network(format!("connection failed: {}", e))
        }
        reqwest_middleware::Error::Reqwest(e) => DashboardError::network(e.to_string()),
        reqwest_middleware::Error::Middleware(e) => DashboardError::network(format!("{:#}", e)),
    }
}

pub(crate) fn classify_status(status: u16, body: &str) -> DashboardError {
    let message = error_message(body);
    match status {
        401 | 403 => DashboardError::Unauthorized {
            reason: if message.is_empty() {
                format!("rejected with status {}", status)
            } else {
                message
            },
        },
        _ => DashboardError::ServerError { status, message },
    }
}

/// The service reports errors as `{"detail": ...}`; anything else is passed
/// through as (truncated) text.
fn error_message(body: &str) -> String {
    if let Ok(serde_json::Value::Object(fields)) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(detail) = fields.get("detail")
    {
        return match detail {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };
    }

    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", truncated)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::credentials::StaticCredentials;

    fn service(base_url: &str) -> HttpPredictionService {
        let api = ApiEnvConfig {
            base_url: base_url.to_string(),
            ..ApiEnvConfig::default()
        };
        HttpPredictionService::new(&api, Arc::new(StaticCredentials::new(Some("t".into()))))
            .unwrap()
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let service = service("http://localhost:8000");
        let url = service.endpoint(&["chart", "BTC-USD"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/chart/BTC-USD");

        let odd = service.endpoint(&["chart", "A/B C"]).unwrap();
        assert_eq!(odd.path(), "/api/chart/A%2FB%20C");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let service = service("https://example.com/dash/");
        let url = service.endpoint(&["predictions"]).unwrap();
        assert_eq!(url.as_str(), "https://example.com/dash/api/predictions");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let api = ApiEnvConfig {
            base_url: "not a url".to_string(),
            ..ApiEnvConfig::default()
        };
        assert!(HttpPredictionService::new(&api, Arc::new(StaticCredentials::default())).is_err());
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(401, r#"{"detail": "Token expired"}"#),
            DashboardError::Unauthorized { reason } if reason == "Token expired"
        ));
        assert!(matches!(
            classify_status(403, ""),
            DashboardError::Unauthorized { reason } if reason.contains("403")
        ));
        assert_eq!(
            classify_status(500, r#"{"detail": "model unavailable"}"#),
            DashboardError::ServerError {
                status: 500,
                message: "model unavailable".into()
            }
        );
        assert_eq!(
            classify_status(502, "Bad Gateway\n"),
            DashboardError::ServerError {
                status: 502,
                message: "Bad Gateway".into()
            }
        );
    }

    #[test]
    fn test_structured_detail_is_kept_as_json() {
        let body = r#"{"detail": [{"loc": ["body", "stake_amount"], "msg": "field required"}]}"#;
        match classify_status(422, body) {
            DashboardError::ServerError { status, message } => {
                assert_eq!(status, 422);
                assert!(message.contains("field required"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        let message = error_message(&body);
        assert_eq!(message.len(), MAX_ERROR_BODY_CHARS + 3);
        assert!(message.ends_with("..."));
    }
}
