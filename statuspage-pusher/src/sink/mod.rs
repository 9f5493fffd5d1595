//! Metric sink abstraction.

mod statuspage;

use async_trait::async_trait;

use crate::chunk::Batch;
use crate::error::UploadError;

pub use statuspage::{StatuspageClient, StatuspageConfig, DEFAULT_API_BASE};

/// Batched upload capability of a status-reporting API.
///
/// Every batch is self-contained; uploads may happen in any order.
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn upload(&self, batch: &Batch<'_>) -> Result<(), UploadError>;
}
