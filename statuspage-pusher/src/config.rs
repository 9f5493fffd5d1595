//! Query definitions and pipeline settings.
//!
//! Query definitions are a flat YAML mapping of Statuspage metric IDs to
//! PromQL expressions:
//!
//! ```yaml
//! abcd1234: sum(rate(http_requests_total{code=~"5.."}[5m]))
//! efgh5678: histogram_quantile(0.99, sum by (le) (rate(latency_bucket[5m])))
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::Level;

use crate::error::ConfigError;
use crate::point::{MetricId, DEFAULT_PRECISION};

/// Mapping from metric ID to query expression. Loaded once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct QueryConfig {
    queries: BTreeMap<MetricId, String>,
}

impl QueryConfig {
    /// Parse query definitions from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: QueryConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse query definitions from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (metric_id, expression) in &self.queries {
            if metric_id.trim().is_empty() {
                return Err(ConfigError::Parse {
                    message: "metric ID cannot be blank".to_string(),
                });
            }
            if expression.trim().is_empty() {
                return Err(ConfigError::Parse {
                    message: format!("query for metric {metric_id} is blank"),
                });
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetricId, &String)> {
        self.queries.iter()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl<K: Into<MetricId>, V: Into<String>> FromIterator<(K, V)> for QueryConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            queries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Settings consumed by the query-and-push pipeline.
#[derive(Debug, Clone)]
pub struct PusherConfig {
    queries: QueryConfig,
    interval: Duration,
    rounding: u32,
    backfill: Option<Duration>,
}

impl PusherConfig {
    /// Create a config with a 30s push interval, 6-digit rounding and no backfill.
    pub fn new(queries: QueryConfig) -> Self {
        Self {
            queries,
            interval: Duration::from_secs(30),
            rounding: DEFAULT_PRECISION,
            backfill: None,
        }
    }

    /// Set the push interval (also the range-query step).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the number of fractional digits kept in values.
    pub fn with_rounding(mut self, rounding: u32) -> Self {
        self.rounding = rounding;
        self
    }

    /// Set the backfill for the first run. `None` or zero disables it.
    pub fn with_backfill(mut self, backfill: Option<Duration>) -> Self {
        self.backfill = backfill.filter(|d| !d.is_zero());
        self
    }

    pub fn queries(&self) -> &QueryConfig {
        &self.queries
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn rounding(&self) -> u32 {
        self.rounding
    }

    pub fn backfill(&self) -> Option<Duration> {
        self.backfill
    }

    pub(crate) fn into_queries(self) -> QueryConfig {
        self.queries
    }
}

#[allow(clippy::expect_used)]
static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:([0-9]+)y)?(?:([0-9]+)w)?(?:([0-9]+)d)?(?:([0-9]+)h)?(?:([0-9]+)m)?(?:([0-9]+)s)?(?:([0-9]+)ms)?$",
    )
    .expect("duration pattern is valid")
});

const UNIT_MILLIS: [u64; 7] = [
    365 * 24 * 60 * 60 * 1000,
    7 * 24 * 60 * 60 * 1000,
    24 * 60 * 60 * 1000,
    60 * 60 * 1000,
    60 * 1000,
    1000,
    1,
];

/// Parse a duration such as `5d`, `1h30m` or `250ms`.
///
/// Units must appear in descending order (`y w d h m s ms`); `0` is accepted
/// on its own.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration {
        input: input.to_string(),
    };

    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        return Err(invalid());
    }

    let captures = DURATION_PATTERN.captures(input).ok_or_else(invalid)?;

    let mut total: u64 = 0;
    for (index, unit) in UNIT_MILLIS.iter().enumerate() {
        if let Some(group) = captures.get(index + 1) {
            let count: u64 = group.as_str().parse().map_err(|_| invalid())?;
            total = count
                .checked_mul(*unit)
                .and_then(|millis| total.checked_add(millis))
                .ok_or_else(invalid)?;
        }
    }

    if total > i64::MAX as u64 {
        return Err(invalid());
    }
    Ok(Duration::from_millis(total))
}

/// Parse a log level name. `fatal` and `panic` are accepted as `error`.
pub fn parse_log_level(input: &str) -> Result<Level, ConfigError> {
    match input.to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" | "fatal" | "panic" => Ok(Level::ERROR),
        _ => Err(ConfigError::InvalidLogLevel {
            input: input.to_string(),
        }),
    }
}
