//! Prelude for commonly used types and traits in statuspage-pusher.

pub use crate::chunk::{chunk, Batch, MAX_POINTS_PER_BATCH};
pub use crate::config::{PusherConfig, QueryConfig};
pub use crate::error::{ConfigError, QueryError, UploadError};
pub use crate::point::{MetricId, MetricPoint, MetricPointSet};
pub use crate::runner::{QueryRun, QueryRunner};
pub use crate::scheduler::{run_cycle, CycleStats, Scheduler};
pub use crate::sink::{MetricSink, StatuspageClient, StatuspageConfig};
pub use crate::source::{PrometheusClient, PrometheusConfig, TimeSeriesSource};
