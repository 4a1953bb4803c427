//! Bucketing engine
//!
//! Partitions a timestamp-sorted run of measurements into the fixed-width
//! buckets of a [`WindowSpec`] and reduces each bucket to one scalar.
//!
//! The partition is a single forward sweep with two cursors: for bucket `i`
//! the upper cursor advances while the measurement timestamp is below the
//! bucket's exclusive upper edge, the slice between the cursors is reduced,
//! and the lower cursor jumps to the upper one. Each measurement is visited
//! once, so the cost is `O(n + bucket_count)` plus whatever the reducer
//! spends per bucket. A timestamp sitting exactly on a bucket edge belongs
//! to the bucket starting at that edge.
//!
//! The engine neither sorts nor filters. Callers pass measurements already
//! restricted to the window's device and ordered by ascending timestamp.
//! Buckets that receive nothing reduce the empty slice, so the output always
//! has exactly `bucket_count` entries.
//!
//! # Example
//!
//! ```rust
//! use lumen_tsdb::aggregation::{bucketize, Mean, WindowSpec};
//! use lumen_tsdb::types::Measurement;
//!
//! let window = WindowSpec {
//!     device_id: "lamp".into(),
//!     start: 0,
//!     end: 7200,
//!     bucket_width: 3600,
//!     reducer: "mean".into(),
//! };
//! let series = vec![
//!     Measurement::new("lamp", 0, 1.0),
//!     Measurement::new("lamp", 3600, 3.0),
//!     Measurement::new("lamp", 7199, 5.0),
//! ];
//! assert_eq!(bucketize(&series, &window, &Mean), vec![1.0, 4.0]);
//! ```

use std::ops::Range;

use super::reducers::Reducer;
use super::window::WindowSpec;
use crate::types::{Measurement, Timestamp};

/// One bucket produced by the sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSpan {
    /// Bucket index within the window
    pub index: usize,
    /// Inclusive lower edge
    pub lower: Timestamp,
    /// Exclusive upper edge
    pub upper: Timestamp,
    /// Positions of the bucket's measurements in the input sequence
    pub members: Range<usize>,
}

impl BucketSpan {
    /// Number of measurements in the bucket
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the bucket received no measurements
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Iterator performing the two-cursor sweep
///
/// Yields one [`BucketSpan`] per bucket, in bucket order.
pub struct BucketSweep<'a> {
    timestamps: TimestampSource<'a>,
    window: &'a WindowSpec,
    bucket_count: usize,
    next_bucket: usize,
    lo: usize,
    hi: usize,
}

enum TimestampSource<'a> {
    Measurements(&'a [Measurement]),
    Raw(&'a [Timestamp]),
}

impl TimestampSource<'_> {
    fn len(&self) -> usize {
        match self {
            TimestampSource::Measurements(m) => m.len(),
            TimestampSource::Raw(t) => t.len(),
        }
    }

    fn at(&self, index: usize) -> Timestamp {
        match self {
            TimestampSource::Measurements(m) => m[index].timestamp,
            TimestampSource::Raw(t) => t[index],
        }
    }
}

impl<'a> BucketSweep<'a> {
    /// Sweep over a sorted measurement sequence
    pub fn new(measurements: &'a [Measurement], window: &'a WindowSpec) -> Self {
        Self::with_source(TimestampSource::Measurements(measurements), window)
    }

    /// Sweep over a sorted run of bare timestamps
    pub fn over_timestamps(timestamps: &'a [Timestamp], window: &'a WindowSpec) -> Self {
        Self::with_source(TimestampSource::Raw(timestamps), window)
    }

    fn with_source(timestamps: TimestampSource<'a>, window: &'a WindowSpec) -> Self {
        Self {
            timestamps,
            window,
            bucket_count: window.bucket_count(),
            next_bucket: 0,
            lo: 0,
            hi: 0,
        }
    }
}

impl Iterator for BucketSweep<'_> {
    type Item = BucketSpan;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_bucket >= self.bucket_count {
            return None;
        }

        let index = self.next_bucket;
        let upper = self.window.bucket_upper(index);
        let len = self.timestamps.len();

        while self.hi < len && self.timestamps.at(self.hi) < upper {
            self.hi += 1;
        }

        let span = BucketSpan {
            index,
            lower: self.window.bucket_lower(index),
            upper,
            members: self.lo..self.hi,
        };

        self.lo = self.hi;
        self.next_bucket += 1;
        Some(span)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.bucket_count - self.next_bucket;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BucketSweep<'_> {}

/// Reduce each bucket of `window` to one value
///
/// Returns exactly `window.bucket_count()` values in bucket order.
pub fn bucketize(
    measurements: &[Measurement],
    window: &WindowSpec,
    reducer: &dyn Reducer,
) -> Vec<f64> {
    let values: Vec<f64> = measurements.iter().map(|m| m.value).collect();

    BucketSweep::new(measurements, window)
        .map(|span| reducer.reduce(&values[span.members]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::reducers::{Mean, Median, Sum};

    fn window(start: i64, end: i64, width: i64) -> WindowSpec {
        WindowSpec {
            device_id: "lamp".to_string(),
            start,
            end,
            bucket_width: width,
            reducer: "mean".to_string(),
        }
    }

    fn series(points: &[(i64, f64)]) -> Vec<Measurement> {
        points
            .iter()
            .map(|&(ts, v)| Measurement::new("lamp", ts, v))
            .collect()
    }

    #[test]
    fn test_single_bucket_mean() {
        let data = series(&[(0, 0.2), (1800, 0.8)]);
        assert_eq!(bucketize(&data, &window(0, 3600, 3600), &Mean), vec![0.5]);
    }

    #[test]
    fn test_empty_series_yields_zero_buckets_values() {
        assert_eq!(bucketize(&[], &window(0, 3600, 3600), &Mean), vec![0.0]);
        assert_eq!(
            bucketize(&[], &window(0, 4 * 3600, 3600), &Median),
            vec![0.0; 4]
        );
    }

    #[test]
    fn test_two_buckets() {
        let data = series(&[(0, 1.0), (3600, 3.0), (7199, 5.0)]);
        assert_eq!(
            bucketize(&data, &window(0, 7200, 3600), &Mean),
            vec![1.0, 4.0]
        );
    }

    #[test]
    fn test_narrow_window_has_no_buckets() {
        let data = series(&[(0, 1.0)]);
        assert!(bucketize(&data, &window(0, 3599, 3600), &Mean).is_empty());
    }

    #[test]
    fn test_boundary_timestamp_lands_in_later_bucket() {
        let data = series(&[(99, 1.0), (100, 10.0), (199, 20.0), (200, 100.0)]);
        let w = window(0, 300, 100);
        let spans: Vec<_> = BucketSweep::new(&data, &w).collect();

        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].members, 0..1);
        assert_eq!(spans[1].members, 1..3);
        assert_eq!(spans[2].members, 3..4);
        assert_eq!(bucketize(&data, &w, &Sum), vec![1.0, 30.0, 100.0]);
    }

    #[test]
    fn test_gaps_between_populated_buckets() {
        let data = series(&[(10, 2.0), (310, 4.0)]);
        let w = window(0, 400, 100);
        assert_eq!(bucketize(&data, &w, &Mean), vec![2.0, 0.0, 0.0, 4.0]);
    }

    #[test]
    fn test_trailing_partial_bucket_is_not_consumed() {
        let data = series(&[(50, 1.0), (150, 2.0)]);
        let w = window(0, 150, 100);
        let spans: Vec<_> = BucketSweep::new(&data, &w).collect();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].len(), 1);
        assert_eq!(w.covered_end(), 100);
    }

    #[test]
    fn test_sweep_is_exact_size() {
        let w = window(0, 1000, 100);
        let timestamps = [5, 105, 999];
        let sweep = BucketSweep::over_timestamps(&timestamps, &w);
        assert_eq!(sweep.len(), 10);
        let total: usize = sweep.map(|span| span.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_spans_are_ordered_and_contiguous() {
        let timestamps: Vec<i64> = (0..50).map(|i| i * 37).collect();
        let w = window(0, 1800, 60);
        let mut expected_lo = 0;
        for (i, span) in BucketSweep::over_timestamps(&timestamps, &w).enumerate() {
            assert_eq!(span.index, i);
            assert_eq!(span.members.start, expected_lo);
            assert_eq!(span.upper - span.lower, 60);
            for ts in &timestamps[span.members.clone()] {
                assert!(*ts >= span.lower && *ts < span.upper);
            }
            expected_lo = span.members.end;
        }
    }
}
