use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::chunk::Batch;
use crate::error::{ConfigError, UploadError};
use crate::security::SecureString;
use crate::sink::MetricSink;

/// Public Statuspage API root.
pub const DEFAULT_API_BASE: &str = "https://api.statuspage.io/v1";

/// Configuration for pushing to a Statuspage page.
#[derive(Debug, Clone)]
pub struct StatuspageConfig {
    api_key: SecureString,
    page_id: String,
    api_base: String,
    timeout: Duration,
}

impl StatuspageConfig {
    /// Create a new StatuspageConfig for `page_id` authenticated with `api_key`.
    pub fn new(api_key: impl Into<String>, page_id: impl Into<String>) -> Self {
        Self {
            api_key: SecureString::new(api_key.into()),
            page_id: page_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set a custom API root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the HTTP request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the API key.
    ///
    /// # Security
    /// Returns a reference to the secure string. Use `expose()` to access
    /// the underlying value. Avoid storing or logging the exposed value.
    pub fn api_key(&self) -> &SecureString {
        &self.api_key
    }

    /// Get the page ID.
    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    /// Get the HTTP request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// URL of the page's metric data endpoint.
    pub fn metrics_url(&self) -> String {
        format!(
            "{}/pages/{}/metrics/data",
            self.api_base.trim_end_matches('/'),
            self.page_id
        )
    }
}

#[derive(Serialize)]
struct Payload<'a, 'b> {
    data: &'a Batch<'b>,
}

/// HTTP client for the Statuspage metrics API.
#[derive(Clone)]
pub struct StatuspageClient {
    config: Arc<StatuspageConfig>,
    client: Client,
}

impl StatuspageClient {
    /// Create a new client with the given configuration.
    pub fn new(config: StatuspageConfig) -> Result<Self, ConfigError> {
        if config.api_key().expose().is_empty() {
            return Err(ConfigError::Missing {
                field: "statuspage_api_key",
            });
        }
        if config.page_id().is_empty() {
            return Err(ConfigError::Missing {
                field: "statuspage_page_id",
            });
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::InvalidClient {
                message: format!("Failed to create Statuspage client: {e}"),
            })?;

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    /// Convert an error response to an UploadError.
    async fn handle_error_response(&self, response: reqwest::Response) -> UploadError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let body = response
            .text()
            .await
            .ok()
            .filter(|body| !body.is_empty())
            .unwrap_or_else(|| "Empty API response".to_string());

        match status.as_u16() {
            401 | 403 => UploadError::Authentication { message: body },
            429 => UploadError::RateLimited {
                retry_after_secs: retry_after,
            },
            400 | 422 => UploadError::InvalidRequest { message: body },
            status => UploadError::ServerError {
                status,
                message: body,
            },
        }
    }
}

#[async_trait]
impl MetricSink for StatuspageClient {
    async fn upload(&self, batch: &Batch<'_>) -> Result<(), UploadError> {
        let body =
            serde_json::to_vec(&Payload { data: batch }).map_err(|e| UploadError::Serialization {
                message: e.to_string(),
            })?;

        debug!(
            payload = %String::from_utf8_lossy(&body),
            "Metrics payload pushing to Statuspage"
        );
        let metric_ids = batch.metric_ids().collect::<Vec<_>>().join(", ");
        info!(metrics = %metric_ids, points = batch.len(), "Pushing metrics");

        let response = self
            .client
            .post(self.config.metrics_url())
            .header("Content-Type", "application/json")
            .header(
                "Authorization",
                format!("OAuth {}", self.config.api_key().expose()),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::Network {
                message: e.to_string(),
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.handle_error_response(response).await)
        }
    }
}
