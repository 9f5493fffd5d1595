//! Per-metric query execution.
//!
//! Every configured metric is queried independently; one failing query never
//! affects the others. The outcome of each metric is kept in a [`QueryRun`]
//! so failures can be inspected directly instead of scraped from logs.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{error, info, instrument, warn};

use crate::config::QueryConfig;
use crate::error::QueryError;
use crate::point::{MetricId, MetricPoint, MetricPointSet};
use crate::range::RangeFetcher;
use crate::source::{QueryData, QueryResponse, Sample, TimeSeriesSource};

/// Points of one metric, or the reason it is missing this tick.
pub type MetricOutcome = Result<Vec<MetricPoint>, QueryError>;

/// Outcomes of one pass over the query configuration.
#[derive(Debug, Default)]
pub struct QueryRun {
    pub outcomes: BTreeMap<MetricId, MetricOutcome>,
}

impl QueryRun {
    /// Number of metrics that produced points.
    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_ok()).count()
    }

    /// Number of metrics whose query failed.
    pub fn failed(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_err()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&MetricId, &QueryError)> {
        self.outcomes
            .iter()
            .filter_map(|(id, outcome)| outcome.as_ref().err().map(|e| (id, e)))
    }

    /// Successful metrics only; failed metrics are absent, not empty.
    pub fn into_point_set(self) -> MetricPointSet {
        self.outcomes
            .into_iter()
            .filter_map(|(id, outcome)| outcome.ok().map(|points| (id, points)))
            .collect()
    }
}

/// Runs every configured query against a shared source.
pub struct QueryRunner {
    source: Arc<dyn TimeSeriesSource>,
    queries: Arc<QueryConfig>,
    range: RangeFetcher,
    precision: u32,
}

impl QueryRunner {
    /// `step` is the push interval, used as range-query resolution during backfill.
    pub fn new(
        source: Arc<dyn TimeSeriesSource>,
        queries: Arc<QueryConfig>,
        step: Duration,
        precision: u32,
    ) -> Self {
        Self {
            range: RangeFetcher::new(Arc::clone(&source), step, precision),
            source,
            queries,
            precision,
        }
    }

    pub fn queries(&self) -> &QueryConfig {
        &self.queries
    }

    /// Query every metric at `now`, backfilling over `backfill` when given.
    ///
    /// Metrics are queried concurrently.
    pub async fn run(&self, now: DateTime<Utc>, backfill: Option<Duration>) -> QueryRun {
        let backfill = backfill.filter(|d| !d.is_zero());
        let runs = self.queries.iter().map(|(metric_id, expression)| async move {
            let outcome = self.run_metric(metric_id, expression, now, backfill).await;
            (metric_id.clone(), outcome)
        });

        QueryRun {
            outcomes: join_all(runs).await.into_iter().collect(),
        }
    }

    #[instrument(skip_all, fields(metric_id = %metric_id, backfill = ?backfill))]
    async fn run_metric(
        &self,
        metric_id: &str,
        expression: &str,
        now: DateTime<Utc>,
        backfill: Option<Duration>,
    ) -> MetricOutcome {
        let response = match backfill {
            Some(backfill) => self.range.fetch(expression, now, backfill).await,
            None => self.query_instant(expression, now).await,
        };

        for warning in &response.warnings {
            warn!("Prometheus query warning: {warning}");
        }
        if let Err(e) = &response.result {
            error!("{e}");
        }

        response.result
    }

    async fn query_instant(
        &self,
        expression: &str,
        now: DateTime<Utc>,
    ) -> QueryResponse<Vec<MetricPoint>> {
        let response = self.source.query_instant(expression, now).await;
        let result = response.result.and_then(single_sample).and_then(|sample| {
            info!(value = sample.value, "Query result");
            let point = MetricPoint::from_sample(&sample, self.precision)?;
            Ok(vec![point])
        });

        QueryResponse {
            result,
            warnings: response.warnings,
        }
    }
}

fn single_sample(data: QueryData) -> Result<Sample, QueryError> {
    match data {
        QueryData::Vector(series) if series.len() == 1 => Ok(series[0].value),
        QueryData::Vector(series) => Err(QueryError::UnexpectedCardinality {
            actual: series.len(),
        }),
        other => Err(QueryError::UnexpectedResultType {
            expected: "vector",
            actual: other.kind(),
        }),
    }
}
