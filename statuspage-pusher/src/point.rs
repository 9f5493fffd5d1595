//! Metric points as reported to Statuspage, and the validation that turns raw
//! samples into them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::InvalidValue;
use crate::source::Sample;

/// Default number of fractional digits kept when formatting values.
pub const DEFAULT_PRECISION: u32 = 6;

/// Largest precision the formatter accepts.
pub const MAX_PRECISION: u32 = u16::MAX as u32;

/// Identifier of a metric: selects the query and names the Statuspage series.
pub type MetricId = String;

/// All points gathered during one tick, keyed by metric.
///
/// A `BTreeMap` keeps iteration (and therefore batching) deterministic.
pub type MetricPointSet = BTreeMap<MetricId, Vec<MetricPoint>>;

/// A single data point in Statuspage wire format.
///
/// `value` holds the already-rounded decimal text. It is written to JSON as a
/// bare number so the fractional digits survive unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: i64,
    #[serde(with = "raw_number")]
    pub value: String,
}

impl MetricPoint {
    /// Validates and rounds a raw sample.
    ///
    /// NaN and infinite values are rejected. The timestamp is floored to whole
    /// seconds and the value is fixed to `precision` fractional digits.
    pub fn from_sample(sample: &Sample, precision: u32) -> Result<Self, InvalidValue> {
        if !sample.value.is_finite() {
            return Err(InvalidValue {
                value: sample.value,
            });
        }

        Ok(Self {
            timestamp: sample.timestamp.floor() as i64,
            value: format_value(sample.value, precision),
        })
    }
}

/// Formats `value` with exactly `precision` digits after the decimal point.
///
/// Precisions above [`MAX_PRECISION`] are capped.
pub fn format_value(value: f64, precision: u32) -> String {
    let precision = precision.min(MAX_PRECISION) as usize;
    format!("{value:.precision$}")
}

/// Total number of points across every metric of a set.
pub fn point_count(set: &MetricPointSet) -> usize {
    set.values().map(Vec::len).sum()
}

mod raw_number {
    use serde::de::Deserializer;
    use serde::ser::{Error, Serializer};
    use serde::{Deserialize, Serialize};
    use serde_json::value::RawValue;

    pub fn serialize<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = RawValue::from_string(value.to_owned()).map_err(S::Error::custom)?;
        raw.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        let raw: Box<RawValue> = Deserialize::deserialize(deserializer)?;
        Ok(raw.get().to_owned())
    }
}
