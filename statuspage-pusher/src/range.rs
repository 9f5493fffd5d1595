//! Historical backfill through bounded range queries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::QueryError;
use crate::point::MetricPoint;
use crate::source::{QueryData, QueryResponse, RangeSeries, TimeRange, TimeSeriesSource};

/// Longest interval covered by a single range query.
pub const BACKFILL_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Splits a backfill interval into windows of at most [`BACKFILL_WINDOW`] and
/// concatenates the validated points of every window.
#[derive(Clone)]
pub struct RangeFetcher {
    source: Arc<dyn TimeSeriesSource>,
    step: Duration,
    precision: u32,
}

impl RangeFetcher {
    /// `step` is the resolution of every range query.
    pub fn new(source: Arc<dyn TimeSeriesSource>, step: Duration, precision: u32) -> Self {
        Self {
            source,
            step,
            precision,
        }
    }

    /// Fetch all valid points of `expression` between `now - backfill` and `now`.
    ///
    /// Consecutive windows are separated by one millisecond so the boundary
    /// sample is not requested twice. NaN samples are dropped individually;
    /// any other failure aborts the whole fetch. Warnings gathered up to the
    /// point of failure are always returned.
    pub async fn fetch(
        &self,
        expression: &str,
        now: DateTime<Utc>,
        backfill: Duration,
    ) -> QueryResponse<Vec<MetricPoint>> {
        let mut warnings = Vec::new();
        let mut points = Vec::new();

        let (Some(mut start), Ok(window), Ok(skip)) = (
            backfill_start(now, backfill),
            chrono::Duration::from_std(BACKFILL_WINDOW),
            chrono::Duration::from_std(Duration::from_millis(1)),
        ) else {
            return QueryResponse::err(
                QueryError::InvalidRange {
                    message: format!("backfill of {backfill:?} is out of range"),
                },
                warnings,
            );
        };

        while start < now {
            let end = (start + window).min(now);
            info!(
                start = %start.to_rfc3339(),
                end = %end.to_rfc3339(),
                step = ?self.step,
                "Querying metrics range"
            );

            let range = TimeRange {
                start,
                end,
                step: self.step,
            };
            let response = self.source.query_range(expression, range).await;
            warnings.extend(response.warnings);

            let series = match response.result.and_then(single_series) {
                Ok(series) => series,
                Err(e) => return QueryResponse::err(e, warnings),
            };

            info!(samples = series.values.len(), "Got samples");
            debug!(values = ?series.values, "Query result");

            for sample in &series.values {
                match MetricPoint::from_sample(sample, self.precision) {
                    Ok(point) => points.push(point),
                    Err(e) => warn!(timestamp = sample.timestamp, "{e}"),
                }
            }

            start = end + skip;
        }

        QueryResponse::ok(points, warnings)
    }
}

fn backfill_start(now: DateTime<Utc>, backfill: Duration) -> Option<DateTime<Utc>> {
    let span = chrono::Duration::from_std(backfill).ok()?;
    now.checked_sub_signed(span)
}

fn single_series(data: QueryData) -> Result<RangeSeries, QueryError> {
    match data {
        QueryData::Matrix(mut series) if series.len() == 1 => Ok(series.remove(0)),
        QueryData::Matrix(series) => Err(QueryError::UnexpectedCardinality {
            actual: series.len(),
        }),
        other => Err(QueryError::UnexpectedResultType {
            expected: "matrix",
            actual: other.kind(),
        }),
    }
}
