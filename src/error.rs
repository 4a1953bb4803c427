//! Error types for the service

use thiserror::Error;

use crate::network::NetworkError;
use crate::query::QueryError;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum Error {
    /// Measurement store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Query error
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Measurement store errors
///
/// Raised at the store boundary. Invalid measurements are rejected here and
/// never reach the bucketing engine.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or read
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Measurement violates the `timestamp >= 0`, `value >= 0` invariants
    #[error("Invalid measurement for device {device_id} at {timestamp}: {reason}")]
    InvalidMeasurement {
        /// Device the measurement was recorded for
        device_id: String,
        /// Offending timestamp
        timestamp: i64,
        /// Why the measurement was rejected
        reason: String,
    },

    /// Measurement references a device missing from the catalog
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// A device id was re-registered with different coordinates
    #[error("Device {id} already registered at ({lat}, {lon})")]
    DeviceConflict {
        /// Device id
        id: String,
        /// Latitude already on record
        lat: f64,
        /// Longitude already on record
        lon: f64,
    },

    /// A catalog or measurement file could not be parsed
    #[error("Parse error in {path} line {line}: {reason}")]
    Parse {
        /// File being loaded
        path: String,
        /// 1-based line number
        line: usize,
        /// Parser message
        reason: String,
    },

    /// IO error while loading store files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the failure is transient I/O and may succeed on a retry
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Io(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::InvalidMeasurement {
            device_id: "lamp-1".to_string(),
            timestamp: 10,
            reason: "value must be non-negative".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("lamp-1"));
        assert!(msg.contains("non-negative"));
    }

    #[test]
    fn test_transient_store_errors() {
        assert!(StoreError::Unavailable("locked".into()).is_unavailable());
        assert!(StoreError::Io(std::io::Error::other("disk gone")).is_unavailable());
        assert!(!StoreError::UnknownDevice("x".into()).is_unavailable());
        assert!(!StoreError::Parse {
            path: "m.jsonl".into(),
            line: 3,
            reason: "bad".into()
        }
        .is_unavailable());
    }

    #[test]
    fn test_store_error_converts() {
        let err: Error = StoreError::UnknownDevice("x".into()).into();
        assert!(matches!(err, Error::Store(_)));
    }
}
