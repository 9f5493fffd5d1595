//! # statuspage-pusher
//!
//! Periodically evaluates a fixed set of Prometheus queries and republishes
//! the results as Statuspage metric data points.
//!
//! ## Overview
//!
//! Each cycle runs every configured query, turns the samples into rounded
//! points, packs them into batches that respect Statuspage's per-request
//! point limit and uploads each batch independently:
//!
//! ```text
//! QueryConfig ──▶ QueryRunner ──▶ MetricPointSet ──▶ chunk() ──▶ [Batch] ──▶ MetricSink
//!                    │
//!                    ├─ instant query (steady state)
//!                    └─ RangeFetcher (backfill, 24h windows)
//! ```
//!
//! Failures are scoped: a failing query only drops its own metric for the
//! tick, a NaN sample during backfill only drops that sample, and a rejected
//! batch does not stop the remaining ones.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use statuspage_pusher::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queries = QueryConfig::from_file("queries.yaml")?;
//! let source = Arc::new(PrometheusClient::new(PrometheusConfig::new("http://localhost:9090"))?);
//! let sink = Arc::new(StatuspageClient::new(StatuspageConfig::new("api-key", "page-id"))?);
//!
//! let config = PusherConfig::new(queries)
//!     .with_interval(Duration::from_secs(30))
//!     .with_backfill(Some(Duration::from_secs(5 * 24 * 3600)));
//! let scheduler = Scheduler::from_config(config, source, sink)?;
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! scheduler.run(shutdown_rx).await;
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod config;
pub mod error;
pub mod logging;
pub mod point;
pub mod prelude;
pub mod range;
pub mod runner;
pub mod scheduler;
pub mod security;
pub mod sink;
pub mod source;

#[cfg(test)]
pub mod test_helpers;
