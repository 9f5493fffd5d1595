//! Error types for the pusher.
//!
//! Each failure class has its own scope: a [`ConfigError`] stops the process
//! before scheduling starts, a [`QueryError`] voids one metric (or one whole
//! backfill) for the current tick, an [`InvalidValue`] voids a single sample,
//! and an [`UploadError`] voids a single batch.

use std::path::PathBuf;

use thiserror::Error;

/// A sample value that cannot be reported (NaN or infinite).
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("Invalid metric value {value}")]
pub struct InvalidValue {
    pub value: f64,
}

/// Errors raised while loading configuration. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The query definitions file could not be read.
    #[error("Couldn't read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The query definitions are malformed.
    #[error("Couldn't parse config: {message}")]
    Parse { message: String },

    /// A duration flag does not follow the `1d2h30m` grammar.
    #[error("Incorrect duration format: {input}")]
    InvalidDuration { input: String },

    /// Unknown log level name.
    #[error("Unknown log level: {input}")]
    InvalidLogLevel { input: String },

    /// A required setting was not provided.
    #[error("Missing required setting: {field}")]
    Missing { field: &'static str },

    /// The push interval must be positive.
    #[error("Push interval must be greater than zero")]
    ZeroInterval,

    /// Rounding precision beyond what the value formatter supports.
    #[error("Rounding of {rounding} digits exceeds the maximum of {max}")]
    InvalidRounding { rounding: u32, max: u32 },

    /// A transport client could not be constructed from the settings.
    #[error("Invalid client configuration: {message}")]
    InvalidClient { message: String },
}

/// Errors from the time-series source, scoped to one metric.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The source could not be reached (connection refused, timeout, ...).
    #[error("Couldn't query Prometheus: {message}")]
    Network { message: String },

    /// The source answered with an API-level error.
    #[error("Couldn't query Prometheus: {error_type}: {message}")]
    Api { error_type: String, message: String },

    /// Non-success HTTP status without a decodable API error body.
    #[error("Couldn't query Prometheus: HTTP status {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("Couldn't decode Prometheus response: {message}")]
    Serialization { message: String },

    /// The result was not of the expected type (vector for instant, matrix for range).
    #[error("Expected result type {expected}, got {actual}")]
    UnexpectedResultType {
        expected: &'static str,
        actual: &'static str,
    },

    /// The result did not contain exactly the expected number of series.
    #[error("Expected single time serial, got {actual}")]
    UnexpectedCardinality { actual: usize },

    /// The requested time range cannot be represented.
    #[error("Invalid query range: {message}")]
    InvalidRange { message: String },

    /// The single instant sample was NaN or infinite.
    #[error(transparent)]
    InvalidValue(#[from] InvalidValue),
}

/// Errors from the metric sink, scoped to one batch.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Authentication failed (invalid or revoked API key).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Network error (connection failed, timeout, etc.).
    #[error("Network error: {message}")]
    Network { message: String },

    /// Rate limited by the server.
    #[error("Rate limited. Retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Server returned an error.
    #[error("HTTP status {status}, API error: {message}")]
    ServerError { status: u16, message: String },

    /// Request validation failed.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Payload could not be encoded.
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl UploadError {
    /// Returns true if the failure is transient.
    ///
    /// Nothing is retried within a tick; this only classifies the log line.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Network { .. } => true,
            UploadError::RateLimited { .. } => true,
            UploadError::ServerError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_display() {
        let err = InvalidValue { value: f64::NAN };
        assert_eq!(err.to_string(), "Invalid metric value NaN");
    }

    #[test]
    fn test_query_error_display() {
        let err = QueryError::UnexpectedCardinality { actual: 3 };
        assert_eq!(err.to_string(), "Expected single time serial, got 3");

        let err = QueryError::UnexpectedResultType {
            expected: "vector",
            actual: "scalar",
        };
        assert_eq!(err.to_string(), "Expected result type vector, got scalar");
    }

    #[test]
    fn test_invalid_value_converts_to_query_error() {
        let err: QueryError = InvalidValue { value: f64::INFINITY }.into();
        assert!(matches!(err, QueryError::InvalidValue(_)));
        assert!(err.to_string().contains("inf"));
    }

    #[test]
    fn test_upload_error_is_retryable() {
        assert!(!UploadError::Authentication {
            message: "test".to_string()
        }
        .is_retryable());
        assert!(UploadError::Network {
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(UploadError::RateLimited {
            retry_after_secs: Some(60)
        }
        .is_retryable());
        assert!(UploadError::ServerError {
            status: 502,
            message: "bad gateway".to_string()
        }
        .is_retryable());
        assert!(!UploadError::ServerError {
            status: 404,
            message: "not found".to_string()
        }
        .is_retryable());
    }
}
