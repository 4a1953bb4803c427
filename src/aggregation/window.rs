//! Window specification and bucket units
//!
//! A window is a `[start, end]` range split into fixed-width, half-open
//! buckets `[start + i*width, start + (i+1)*width)`. The number of buckets
//! is `floor((end - start) / width)`; a window narrower than one bucket has
//! zero buckets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{DeviceId, Timestamp};

/// Named bucket widths accepted by the `per` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketUnit {
    /// 60 seconds
    Minute,
    /// 15 minutes
    Quarter,
    /// 3600 seconds
    Hour,
    /// 86400 seconds
    Day,
    /// 604800 seconds
    Week,
}

impl BucketUnit {
    /// All units, finest first
    pub const ALL: [BucketUnit; 5] = [
        BucketUnit::Minute,
        BucketUnit::Quarter,
        BucketUnit::Hour,
        BucketUnit::Day,
        BucketUnit::Week,
    ];

    /// Width of one bucket in seconds
    pub const fn seconds(self) -> i64 {
        match self {
            BucketUnit::Minute => 60,
            BucketUnit::Quarter => 15 * 60,
            BucketUnit::Hour => 60 * 60,
            BucketUnit::Day => 24 * 60 * 60,
            BucketUnit::Week => 7 * 24 * 60 * 60,
        }
    }

    /// Token used on the wire
    pub const fn as_str(self) -> &'static str {
        match self {
            BucketUnit::Minute => "minute",
            BucketUnit::Quarter => "quarter",
            BucketUnit::Hour => "hour",
            BucketUnit::Day => "day",
            BucketUnit::Week => "week",
        }
    }

    /// Resolve a wire token, `None` for unknown tokens
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|unit| unit.as_str() == token)
    }
}

impl fmt::Display for BucketUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BucketUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown bucket unit '{}'", s))
    }
}

/// A validated windowed-aggregation request
///
/// Invariants (enforced by the query service before construction):
/// `start <= end` and `bucket_width > 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Device whose series is bucketed
    pub device_id: DeviceId,
    /// Window start in seconds (inclusive)
    pub start: Timestamp,
    /// Window end in seconds (inclusive for the store read)
    pub end: Timestamp,
    /// Bucket width in seconds
    pub bucket_width: i64,
    /// Reducer name
    pub reducer: String,
}

impl WindowSpec {
    /// Number of whole buckets that fit in `[start, end]`
    pub fn bucket_count(&self) -> usize {
        if self.bucket_width <= 0 || self.end <= self.start {
            return 0;
        }
        let span = self.end.saturating_sub(self.start);
        (span / self.bucket_width) as usize
    }

    /// Exclusive upper edge of bucket `index`
    ///
    /// Saturates at `i64::MAX` so that the sweep stays monotonic for windows
    /// near the end of the timestamp range.
    pub fn bucket_upper(&self, index: usize) -> Timestamp {
        (index as i64)
            .checked_add(1)
            .and_then(|n| n.checked_mul(self.bucket_width))
            .and_then(|offset| self.start.checked_add(offset))
            .unwrap_or(i64::MAX)
    }

    /// Inclusive lower edge of bucket `index`
    pub fn bucket_lower(&self, index: usize) -> Timestamp {
        (index as i64)
            .checked_mul(self.bucket_width)
            .and_then(|offset| self.start.checked_add(offset))
            .unwrap_or(i64::MAX)
    }

    /// End of the span actually covered by buckets
    pub fn covered_end(&self) -> Timestamp {
        self.bucket_lower(self.bucket_count())
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {}] per {}s via {}",
            self.device_id, self.start, self.end, self.bucket_width, self.reducer
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: i64, end: i64, width: i64) -> WindowSpec {
        WindowSpec {
            device_id: "lamp".to_string(),
            start,
            end,
            bucket_width: width,
            reducer: "mean".to_string(),
        }
    }

    #[test]
    fn test_unit_parse() {
        assert_eq!(BucketUnit::parse("hour"), Some(BucketUnit::Hour));
        assert_eq!(BucketUnit::parse("quarter"), Some(BucketUnit::Quarter));
        assert_eq!("week".parse::<BucketUnit>(), Ok(BucketUnit::Week));
        assert!(BucketUnit::parse("fortnight").is_none());
        assert!(BucketUnit::parse("Hour").is_none());
    }

    #[test]
    fn test_unit_seconds() {
        assert_eq!(BucketUnit::Hour.seconds(), 3600);
        assert_eq!(BucketUnit::Day.seconds(), 86_400);
        assert_eq!(BucketUnit::Week.seconds(), 604_800);
    }

    #[test]
    fn test_bucket_count() {
        assert_eq!(window(0, 3600, 3600).bucket_count(), 1);
        assert_eq!(window(0, 7200, 3600).bucket_count(), 2);
        assert_eq!(window(0, 7199, 3600).bucket_count(), 1);
        assert_eq!(window(0, 3599, 3600).bucket_count(), 0);
        assert_eq!(window(10, 10, 3600).bucket_count(), 0);
    }

    #[test]
    fn test_bucket_edges() {
        let w = window(100, 400, 100);
        assert_eq!(w.bucket_lower(0), 100);
        assert_eq!(w.bucket_upper(0), 200);
        assert_eq!(w.bucket_upper(2), 400);
        assert_eq!(w.covered_end(), 400);
    }

    #[test]
    fn test_bucket_upper_saturates() {
        let w = window(i64::MAX - 10, i64::MAX, 5);
        assert_eq!(w.bucket_count(), 2);
        assert_eq!(w.bucket_upper(10), i64::MAX);
    }
}
