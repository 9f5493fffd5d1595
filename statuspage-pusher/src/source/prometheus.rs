use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigError, QueryError};
use crate::source::{QueryData, QueryResponse, TimeRange, TimeSeriesSource};

/// Connection settings for a Prometheus server.
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    url: String,
    timeout: Duration,
}

impl PrometheusConfig {
    /// Create a config for the server at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the HTTP request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the server URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the HTTP request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// HTTP client for the Prometheus query API.
///
/// Built once at start-up and shared by every cycle.
#[derive(Clone)]
pub struct PrometheusClient {
    config: Arc<PrometheusConfig>,
    client: Client,
}

/// Envelope shared by all Prometheus API responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEnvelope {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

impl PrometheusClient {
    /// Create a new client with the given configuration.
    pub fn new(config: PrometheusConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::InvalidClient {
                message: format!("Failed to create Prometheus client: {e}"),
            })?;

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> QueryResponse<QueryData> {
        let url = format!(
            "{}/api/v1/{endpoint}",
            self.config.url().trim_end_matches('/')
        );
        debug!(%url, ?params, "Querying Prometheus");

        let response = match self.client.get(&url).query(params).send().await {
            Ok(response) => response,
            Err(e) => {
                return QueryResponse::err(
                    QueryError::Network {
                        message: e.to_string(),
                    },
                    Vec::new(),
                )
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => decode_response(status, &body),
            Err(e) => QueryResponse::err(
                QueryError::Network {
                    message: e.to_string(),
                },
                Vec::new(),
            ),
        }
    }
}

#[async_trait]
impl TimeSeriesSource for PrometheusClient {
    async fn query_instant(&self, expression: &str, at: DateTime<Utc>) -> QueryResponse<QueryData> {
        let params = [("query", expression.to_string()), ("time", format_time(at))];
        self.get("query", &params).await
    }

    async fn query_range(&self, expression: &str, range: TimeRange) -> QueryResponse<QueryData> {
        let params = [
            ("query", expression.to_string()),
            ("start", format_time(range.start)),
            ("end", format_time(range.end)),
            ("step", range.step.as_secs_f64().to_string()),
        ];
        self.get("query_range", &params).await
    }
}

/// Unix seconds with millisecond precision, as the query API expects.
fn format_time(time: DateTime<Utc>) -> String {
    let millis = time.timestamp_millis();
    let sign = if millis < 0 { "-" } else { "" };
    let millis = millis.unsigned_abs();
    format!("{sign}{}.{:03}", millis / 1000, millis % 1000)
}

fn decode_response(status: u16, body: &str) -> QueryResponse<QueryData> {
    let envelope: ApiEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !(200..300).contains(&status) => {
            return QueryResponse::err(
                QueryError::Http {
                    status,
                    message: body.to_string(),
                },
                Vec::new(),
            )
        }
        Err(e) => {
            return QueryResponse::err(
                QueryError::Serialization {
                    message: e.to_string(),
                },
                Vec::new(),
            )
        }
    };

    let warnings = envelope.warnings;
    if envelope.status != "success" {
        return QueryResponse::err(
            QueryError::Api {
                error_type: envelope.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: envelope.error.unwrap_or_default(),
            },
            warnings,
        );
    }

    match envelope.data {
        Some(data) => QueryResponse::ok(data, warnings),
        None => QueryResponse::err(
            QueryError::Serialization {
                message: "response is missing the data field".to_string(),
            },
            warnings,
        ),
    }
}
