//! Packing of a tick's points into upload-sized batches.
//!
//! Statuspage accepts at most [`MAX_POINTS_PER_BATCH`] points per request.
//! Batches borrow from the point set, so chunking never copies points.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::point::{MetricPoint, MetricPointSet};

/// Upper bound on points in one upload request.
pub const MAX_POINTS_PER_BATCH: usize = 3000;

/// One upload request worth of points: a contiguous slice per metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Batch<'a> {
    points: BTreeMap<&'a str, &'a [MetricPoint]>,
}

impl<'a> Batch<'a> {
    /// Total number of points across all metrics.
    pub fn len(&self) -> usize {
        self.points.values().map(|points| points.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn metric_ids(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.points.keys().copied()
    }

    pub fn get(&self, metric_id: &str) -> Option<&'a [MetricPoint]> {
        self.points.get(metric_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a [MetricPoint])> + '_ {
        self.points.iter().map(|(id, points)| (*id, *points))
    }

    /// Owned copy of the batch contents.
    pub fn to_point_set(&self) -> MetricPointSet {
        self.iter()
            .map(|(id, points)| (id.to_string(), points.to_vec()))
            .collect()
    }
}

/// Chunk `set` into batches of at most [`MAX_POINTS_PER_BATCH`] points.
pub fn chunk(set: &MetricPointSet) -> Vec<Batch<'_>> {
    chunk_with_capacity(set, MAX_POINTS_PER_BATCH)
}

/// Chunk `set` into batches of at most `capacity` points (minimum 1).
///
/// A metric that fits in one batch is never split: when it does not fit in
/// what is left of the current batch, that batch is sealed first. A metric
/// larger than `capacity` fills the current batch and spills into the
/// following ones, keeping its order. An empty set yields one empty batch.
pub fn chunk_with_capacity(set: &MetricPointSet, capacity: usize) -> Vec<Batch<'_>> {
    let capacity = capacity.max(1);
    let mut batches = Vec::new();
    let mut current = Batch::default();
    let mut remaining = capacity;

    for (metric_id, points) in set {
        if points.len() <= capacity && points.len() > remaining {
            batches.push(std::mem::take(&mut current));
            remaining = capacity;
        }

        let mut rest = points.as_slice();
        while !rest.is_empty() {
            let (head, tail) = rest.split_at(rest.len().min(remaining));
            current.points.insert(metric_id.as_str(), head);
            remaining -= head.len();
            rest = tail;

            if remaining == 0 {
                batches.push(std::mem::take(&mut current));
                remaining = capacity;
            }
        }
    }

    if !current.is_empty() || batches.is_empty() {
        batches.push(current);
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::points;

    fn set(sizes: &[(&str, usize)]) -> MetricPointSet {
        sizes
            .iter()
            .map(|(id, n)| (id.to_string(), points(*n)))
            .collect()
    }

    fn sizes(batches: &[Batch<'_>]) -> Vec<usize> {
        batches.iter().map(Batch::len).collect()
    }

    #[test]
    fn test_empty_input_yields_one_empty_batch() {
        let input = MetricPointSet::new();
        let batches = chunk(&input);
        assert_eq!(batches.len(), 1);
        assert!(batches[0].is_empty());
    }

    #[test]
    fn test_metrics_without_points_yield_one_empty_batch() {
        let input = set(&[("a", 0), ("b", 0)]);
        let batches = chunk(&input);
        assert_eq!(batches.len(), 1);
        assert!(batches[0].is_empty());
    }

    #[test]
    fn test_exactly_full_single_batch() {
        let input = set(&[("a", 3000)]);
        let batches = chunk(&input);
        assert_eq!(sizes(&batches), vec![3000]);
    }

    #[test]
    fn test_one_over_capacity_spills() {
        let input = set(&[("a", 3001)]);
        let batches = chunk(&input);
        assert_eq!(sizes(&batches), vec![3000, 1]);
        assert_eq!(batches[1].get("a").unwrap()[0].timestamp, 3000);
    }

    #[test]
    fn test_small_metrics_share_a_batch() {
        let input = set(&[("a", 10), ("b", 20), ("c", 30)]);
        let batches = chunk(&input);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].metric_ids().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_fitting_metric_is_not_split() {
        let input = set(&[("a", 2000), ("b", 2000)]);
        let batches = chunk(&input);
        assert_eq!(sizes(&batches), vec![2000, 2000]);
        assert_eq!(batches[0].metric_ids().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(batches[1].metric_ids().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_oversized_metric_fills_remaining_capacity() {
        let input = set(&[("a", 4), ("b", 10)]);
        let batches = chunk_with_capacity(&input, 6);
        assert_eq!(sizes(&batches), vec![6, 6, 2]);
        assert_eq!(batches[0].get("b").unwrap().len(), 2);
        assert_eq!(batches[1].get("b").unwrap()[0].timestamp, 2);
        assert_eq!(batches[2].get("b").unwrap()[1].timestamp, 9);
    }

    #[test]
    fn test_zero_capacity_is_treated_as_one() {
        let input = set(&[("a", 3)]);
        let batches = chunk_with_capacity(&input, 0);
        assert_eq!(sizes(&batches), vec![1, 1, 1]);
    }

    #[test]
    fn test_batch_serializes_as_metric_map() {
        let input = set(&[("a", 1)]);
        let batches = chunk(&input);
        let json = serde_json::to_string(&batches[0]).unwrap();
        assert_eq!(json, r#"{"a":[{"timestamp":0,"value":0}]}"#);
    }

    #[test]
    fn test_to_point_set_round_trips_contents() {
        let input = set(&[("a", 5), ("b", 7)]);
        let batches = chunk(&input);
        assert_eq!(batches[0].to_point_set(), input);
    }
}
