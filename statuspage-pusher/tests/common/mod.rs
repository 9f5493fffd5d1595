//! Shared collaborators for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use statuspage_pusher::chunk::Batch;
use statuspage_pusher::error::{QueryError, UploadError};
use statuspage_pusher::point::MetricPointSet;
use statuspage_pusher::sink::MetricSink;
use statuspage_pusher::source::{
    InstantSeries, QueryData, QueryResponse, RangeSeries, Sample, TimeRange, TimeSeriesSource,
};

/// Answers a fixed value per expression. Unknown expressions fail with an
/// API error, mimicking a bad query.
#[derive(Default)]
pub struct StaticSource {
    values: HashMap<String, f64>,
    range_samples: usize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, expression: &str, value: f64) -> Self {
        self.values.insert(expression.to_string(), value);
        self
    }

    /// Number of samples returned per range window.
    pub fn with_range_samples(mut self, count: usize) -> Self {
        self.range_samples = count;
        self
    }

    fn lookup(&self, expression: &str) -> Result<f64, QueryError> {
        self.values
            .get(expression)
            .copied()
            .ok_or_else(|| QueryError::Api {
                error_type: "bad_data".to_string(),
                message: format!("unknown expression {expression}"),
            })
    }
}

#[async_trait]
impl TimeSeriesSource for StaticSource {
    async fn query_instant(&self, expression: &str, at: DateTime<Utc>) -> QueryResponse<QueryData> {
        match self.lookup(expression) {
            Ok(value) => QueryResponse::ok(
                QueryData::Vector(vec![InstantSeries {
                    metric: Default::default(),
                    value: Sample {
                        timestamp: at.timestamp() as f64,
                        value,
                    },
                }]),
                Vec::new(),
            ),
            Err(e) => QueryResponse::err(e, Vec::new()),
        }
    }

    async fn query_range(&self, expression: &str, range: TimeRange) -> QueryResponse<QueryData> {
        match self.lookup(expression) {
            Ok(value) => {
                let start = range.start.timestamp() as f64;
                let values = (0..self.range_samples)
                    .map(|i| Sample {
                        timestamp: start + i as f64,
                        value,
                    })
                    .collect();
                QueryResponse::ok(
                    QueryData::Matrix(vec![RangeSeries {
                        metric: Default::default(),
                        values,
                    }]),
                    Vec::new(),
                )
            }
            Err(e) => QueryResponse::err(e, Vec::new()),
        }
    }
}

/// Records every uploaded batch.
#[derive(Default)]
pub struct CollectingSink {
    uploads: Mutex<Vec<MetricPointSet>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> Vec<MetricPointSet> {
        self.uploads.lock().expect("sink lock poisoned").clone()
    }
}

#[async_trait]
impl MetricSink for CollectingSink {
    async fn upload(&self, batch: &Batch<'_>) -> Result<(), UploadError> {
        self.uploads
            .lock()
            .expect("sink lock poisoned")
            .push(batch.to_point_set());
        Ok(())
    }
}
