//! Periodic query-and-push driver.
//!
//! The scheduler primes once (optionally backfilling), then starts a fresh,
//! independent cycle every interval until shutdown. Cycles share nothing
//! mutable, so a slow cycle may overlap the next one.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::chunk::chunk;
use crate::config::PusherConfig;
use crate::error::ConfigError;
use crate::point::{point_count, MAX_PRECISION};
use crate::runner::QueryRunner;
use crate::sink::MetricSink;
use crate::source::TimeSeriesSource;

/// Statistics from one query-and-push cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub metrics_succeeded: usize,
    pub metrics_failed: usize,
    pub points: usize,
    pub batches_uploaded: usize,
    pub batches_failed: usize,
    pub batches_skipped: usize,
}

/// Run one cycle: query every metric, chunk the points and upload each batch.
///
/// Upload failures are logged and do not stop the remaining batches.
#[instrument(skip_all, fields(backfill = ?backfill))]
pub async fn run_cycle(
    runner: &QueryRunner,
    sink: &dyn MetricSink,
    backfill: Option<Duration>,
) -> CycleStats {
    info!("Started to query and push metrics");

    let run = runner.run(Utc::now(), backfill).await;
    let mut stats = CycleStats {
        metrics_succeeded: run.succeeded(),
        metrics_failed: run.failed(),
        ..CycleStats::default()
    };

    let points = run.into_point_set();
    stats.points = point_count(&points);

    for batch in chunk(&points) {
        if batch.is_empty() {
            debug!("No metric points to push");
            stats.batches_skipped += 1;
            continue;
        }

        match sink.upload(&batch).await {
            Ok(()) => stats.batches_uploaded += 1,
            Err(e) => {
                let metric_ids = batch.metric_ids().collect::<Vec<_>>().join(", ");
                error!(
                    metrics = %metric_ids,
                    retryable = e.is_retryable(),
                    "Failed to push metrics: {e}"
                );
                stats.batches_failed += 1;
            }
        }
    }

    info!(
        "Finished querying and pushing metrics: {} metrics ok, {} failed, {} points, {} batches uploaded, {} failed",
        stats.metrics_succeeded,
        stats.metrics_failed,
        stats.points,
        stats.batches_uploaded,
        stats.batches_failed
    );
    stats
}

/// Drives [`run_cycle`]: priming first, then one cycle per interval.
pub struct Scheduler {
    runner: Arc<QueryRunner>,
    sink: Arc<dyn MetricSink>,
    interval: Duration,
    backfill: Option<Duration>,
}

impl Scheduler {
    /// Create a scheduler ticking every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroInterval`] if `interval` is zero.
    pub fn new(
        runner: Arc<QueryRunner>,
        sink: Arc<dyn MetricSink>,
        interval: Duration,
    ) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }

        Ok(Self {
            runner,
            sink,
            interval,
            backfill: None,
        })
    }

    /// Wire the query runner and scheduler from a [`PusherConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroInterval`] for a zero interval and
    /// [`ConfigError::InvalidRounding`] for a rounding above [`MAX_PRECISION`].
    pub fn from_config(
        config: PusherConfig,
        source: Arc<dyn TimeSeriesSource>,
        sink: Arc<dyn MetricSink>,
    ) -> Result<Self, ConfigError> {
        let interval = config.interval();
        let rounding = config.rounding();
        if rounding > MAX_PRECISION {
            return Err(ConfigError::InvalidRounding {
                rounding,
                max: MAX_PRECISION,
            });
        }
        let backfill = config.backfill();
        let runner = QueryRunner::new(
            source,
            Arc::new(config.into_queries()),
            interval,
            rounding,
        );

        Ok(Self::new(Arc::new(runner), sink, interval)?.with_backfill(backfill))
    }

    /// Backfill to apply to the priming run only.
    pub fn with_backfill(mut self, backfill: Option<Duration>) -> Self {
        self.backfill = backfill.filter(|d| !d.is_zero());
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn backfill(&self) -> Option<Duration> {
        self.backfill
    }

    /// Run the priming cycle, with backfill if configured.
    pub async fn prime(&self) -> CycleStats {
        run_cycle(&self.runner, self.sink.as_ref(), self.backfill).await
    }

    /// Prime, then start a cycle every interval until `shutdown` turns true.
    ///
    /// Steady-state cycles run as independent tasks; in-flight cycles are
    /// not awaited on shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval = ?self.interval,
            metrics = self.runner.queries().len(),
            "Scheduler started"
        );
        self.prime().await;

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let runner = Arc::clone(&self.runner);
                    let sink = Arc::clone(&self.sink);
                    tokio::spawn(async move {
                        run_cycle(&runner, sink.as_ref(), None).await
                    });
                }
                Ok(()) = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }
}
