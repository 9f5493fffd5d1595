//! Time-series source abstraction.
//!
//! The pipeline only needs two capabilities from the backend: evaluating an
//! expression at an instant and over a stepped range. Result shape checks
//! (type and series count) are left to the caller so that every backend gets
//! the same validation.

mod prometheus;

use std::collections::BTreeMap;
use std::num::ParseFloatError;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::QueryError;

pub use prometheus::{PrometheusClient, PrometheusConfig};

/// Non-fatal caveats reported by the backend alongside a result.
pub type Warnings = Vec<String>;

/// A raw sample: unix timestamp in (fractional) seconds and its value.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "(f64, String)")]
pub struct Sample {
    pub timestamp: f64,
    pub value: f64,
}

impl TryFrom<(f64, String)> for Sample {
    type Error = ParseFloatError;

    fn try_from((timestamp, value): (f64, String)) -> Result<Self, Self::Error> {
        Ok(Self {
            timestamp,
            value: parse_sample_value(&value)?,
        })
    }
}

/// Parses the string encoding of a sample value, including `NaN` and `±Inf`.
pub fn parse_sample_value(value: &str) -> Result<f64, ParseFloatError> {
    match value {
        "NaN" => Ok(f64::NAN),
        "+Inf" | "Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        other => other.parse(),
    }
}

/// One series of an instant-query vector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstantSeries {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    pub value: Sample,
}

/// One series of a range-query matrix.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RangeSeries {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    #[serde(default)]
    pub values: Vec<Sample>,
}

/// Decoded query result, tagged by result type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryData {
    Vector(Vec<InstantSeries>),
    Matrix(Vec<RangeSeries>),
    Scalar(Sample),
    #[serde(rename = "string")]
    Str((f64, String)),
}

impl QueryData {
    /// Name of the result type as the backend reports it.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryData::Vector(_) => "vector",
            QueryData::Matrix(_) => "matrix",
            QueryData::Scalar(_) => "scalar",
            QueryData::Str(_) => "string",
        }
    }
}

/// Inclusive time range evaluated at a fixed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: Duration,
}

/// A query outcome together with the warnings returned by the backend.
///
/// Warnings are kept even when `result` is an error.
#[derive(Debug)]
pub struct QueryResponse<T> {
    pub result: Result<T, QueryError>,
    pub warnings: Warnings,
}

impl<T> QueryResponse<T> {
    pub fn ok(value: T, warnings: Warnings) -> Self {
        Self {
            result: Ok(value),
            warnings,
        }
    }

    pub fn err(error: QueryError, warnings: Warnings) -> Self {
        Self {
            result: Err(error),
            warnings,
        }
    }
}

/// Query capability of a metrics backend.
#[async_trait]
pub trait TimeSeriesSource: Send + Sync {
    /// Evaluates `expression` at the instant `at`.
    async fn query_instant(&self, expression: &str, at: DateTime<Utc>) -> QueryResponse<QueryData>;

    /// Evaluates `expression` over `range`.
    async fn query_range(&self, expression: &str, range: TimeRange) -> QueryResponse<QueryData>;
}
