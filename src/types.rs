//! Core data types shared by the store, the bucketing engine and the transports
//!
//! # Key Types
//!
//! - **`Device`**: A fixed-location light sensor (id + coordinates)
//! - **`Measurement`**: One timestamped light-level reading for a device
//! - **`TimeRange`**: Inclusive `[start, end]` window used for store range reads
//!
//! Timestamps are integer seconds since the Unix epoch throughout the crate.
//!
//! # Example
//!
//! ```rust
//! use lumen_tsdb::types::{Device, Measurement, TimeRange};
//!
//! let lamp = Device::new("8918593277", 56.17, 10.19);
//! let reading = Measurement::new(&lamp.id, 1_700_000_000, 0.42);
//! assert!(reading.validate().is_ok());
//!
//! let range = TimeRange::new(1_700_000_000, 1_700_003_600).unwrap();
//! assert!(range.contains(reading.timestamp));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreError;

/// Identifier of a physical device
pub type DeviceId = String;

/// Unix timestamp in seconds
pub type Timestamp = i64;

/// A fixed-location sensor
///
/// Identity is the `id`. Devices are created by the ingestion path and are
/// read-only to the query core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Stable device identifier
    pub id: DeviceId,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
}

impl Device {
    /// Create a new device record
    pub fn new(id: impl Into<DeviceId>, lat: f64, lon: f64) -> Self {
        Self {
            id: id.into(),
            lat,
            lon,
        }
    }

    /// Whether two records describe the same physical location
    pub fn same_location(&self, other: &Device) -> bool {
        self.lat == other.lat && self.lon == other.lon
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.6}, {:.6})", self.id, self.lat, self.lon)
    }
}

/// A single light-level reading
///
/// Measurements are append-only. Ordering for queries is by `timestamp`
/// ascending within a `device_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Device this reading belongs to
    pub device_id: DeviceId,
    /// Unix timestamp in seconds
    pub timestamp: Timestamp,
    /// Ambient light level
    pub value: f64,
}

impl Measurement {
    /// Create a new measurement
    pub fn new(device_id: impl Into<DeviceId>, timestamp: Timestamp, value: f64) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            value,
        }
    }

    /// Check the store-boundary invariants
    ///
    /// Rejects negative timestamps and values that are negative, NaN or
    /// infinite. Values are never clamped.
    pub fn validate(&self) -> Result<(), StoreError> {
        let reason = if self.timestamp < 0 {
            "timestamp must be non-negative"
        } else if self.value.is_nan() {
            "value must be a number"
        } else if self.value.is_infinite() {
            "value must be finite"
        } else if self.value < 0.0 {
            "value must be non-negative"
        } else {
            return Ok(());
        };

        Err(StoreError::InvalidMeasurement {
            device_id: self.device_id.clone(),
            timestamp: self.timestamp,
            reason: reason.to_string(),
        })
    }
}

/// Time range for store reads (inclusive on both ends)
///
/// # Example
///
/// ```rust
/// use lumen_tsdb::types::TimeRange;
///
/// let range = TimeRange::new(1000, 2000).unwrap();
/// assert!(range.contains(1000));
/// assert!(range.contains(2000));
/// assert!(!range.contains(2001));
/// assert!(TimeRange::new(2000, 1000).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp in seconds (inclusive)
    pub start: Timestamp,
    /// End timestamp in seconds (inclusive)
    pub end: Timestamp,
}

impl TimeRange {
    /// Create a new time range, `None` when `start > end`
    pub fn new(start: Timestamp, end: Timestamp) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Check if a timestamp falls within this range (inclusive)
    pub fn contains(&self, timestamp: Timestamp) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Duration in seconds, `None` on overflow
    pub fn duration_secs(&self) -> Option<i64> {
        self.end.checked_sub(self.start)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
