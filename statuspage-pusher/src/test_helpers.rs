//! In-memory collaborators for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::chunk::Batch;
use crate::error::UploadError;
use crate::point::{MetricPoint, MetricPointSet};
use crate::sink::MetricSink;
use crate::source::{
    InstantSeries, QueryData, QueryResponse, RangeSeries, Sample, TimeRange, TimeSeriesSource,
};

type InstantFn = dyn Fn(&str, DateTime<Utc>) -> QueryResponse<QueryData> + Send + Sync;
type RangeFn = dyn Fn(&str, TimeRange) -> QueryResponse<QueryData> + Send + Sync;

/// Builds an instant-query vector with one sample per series.
pub fn vector(samples: &[(f64, f64)]) -> QueryData {
    QueryData::Vector(
        samples
            .iter()
            .map(|&(timestamp, value)| InstantSeries {
                metric: Default::default(),
                value: Sample { timestamp, value },
            })
            .collect(),
    )
}

/// Builds a range-query matrix, one inner vec per series.
pub fn matrix(series: Vec<Vec<(f64, f64)>>) -> QueryData {
    QueryData::Matrix(
        series
            .into_iter()
            .map(|samples| RangeSeries {
                metric: Default::default(),
                values: samples
                    .into_iter()
                    .map(|(timestamp, value)| Sample { timestamp, value })
                    .collect(),
            })
            .collect(),
    )
}

pub fn points(count: usize) -> Vec<MetricPoint> {
    (0..count)
        .map(|i| MetricPoint {
            timestamp: i as i64,
            value: format!("{i}"),
        })
        .collect()
}

/// Source that answers from closures and records every call.
///
/// By default instant queries return the value `1.0` at the query time and
/// range queries return a single sample at the window start.
pub struct FakeSource {
    instant: Box<InstantFn>,
    range: Box<RangeFn>,
    instant_calls: Mutex<Vec<(String, DateTime<Utc>)>>,
    range_calls: Mutex<Vec<(String, TimeRange)>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            instant: Box::new(|_, at| {
                QueryResponse::ok(vector(&[(at.timestamp() as f64, 1.0)]), Vec::new())
            }),
            range: Box::new(|_, range| {
                QueryResponse::ok(
                    matrix(vec![vec![(range.start.timestamp() as f64, 1.0)]]),
                    Vec::new(),
                )
            }),
            instant_calls: Mutex::new(Vec::new()),
            range_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_instant(
        mut self,
        f: impl Fn(&str, DateTime<Utc>) -> QueryResponse<QueryData> + Send + Sync + 'static,
    ) -> Self {
        self.instant = Box::new(f);
        self
    }

    pub fn with_range(
        mut self,
        f: impl Fn(&str, TimeRange) -> QueryResponse<QueryData> + Send + Sync + 'static,
    ) -> Self {
        self.range = Box::new(f);
        self
    }

    pub fn instant_calls(&self) -> Vec<(String, DateTime<Utc>)> {
        self.instant_calls.lock().unwrap().clone()
    }

    pub fn range_calls(&self) -> Vec<(String, TimeRange)> {
        self.range_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TimeSeriesSource for FakeSource {
    async fn query_instant(&self, expression: &str, at: DateTime<Utc>) -> QueryResponse<QueryData> {
        self.instant_calls
            .lock()
            .unwrap()
            .push((expression.to_string(), at));
        (self.instant)(expression, at)
    }

    async fn query_range(&self, expression: &str, range: TimeRange) -> QueryResponse<QueryData> {
        self.range_calls
            .lock()
            .unwrap()
            .push((expression.to_string(), range));
        (self.range)(expression, range)
    }
}

/// Sink that stores every uploaded batch and rejects batches containing
/// `fail_on`.
#[derive(Default)]
pub struct RecordingSink {
    fail_on: Option<String>,
    uploads: Mutex<Vec<MetricPointSet>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(metric_id: impl Into<String>) -> Self {
        Self {
            fail_on: Some(metric_id.into()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn uploads(&self) -> Vec<MetricPointSet> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricSink for RecordingSink {
    async fn upload(&self, batch: &Batch<'_>) -> Result<(), UploadError> {
        if let Some(metric_id) = &self.fail_on {
            if batch.get(metric_id).is_some() {
                return Err(UploadError::ServerError {
                    status: 500,
                    message: format!("rejected {metric_id}"),
                });
            }
        }
        self.uploads.lock().unwrap().push(batch.to_point_set());
        Ok(())
    }
}
