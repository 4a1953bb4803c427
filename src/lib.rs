//! Lumen TSDB - windowed light-level aggregation for street-lamp sensors
//!
//! This library answers one question over a per-device measurement log:
//! what did the light level look like over `[start, end]`, bucketed by a
//! fixed unit and reduced per bucket?
//! - Single-pass bucketing over timestamp-sorted measurements
//! - Pluggable reducers (`mean`, `median`, `min`, `max`, `sum`)
//! - One query path shared by HTTP, a line socket and JSON-RPC
//!
//! # Example
//!
//! ```rust
//! use lumen_tsdb::aggregation::{bucketize, BucketUnit, Mean, WindowSpec};
//! use lumen_tsdb::types::Measurement;
//!
//! let window = WindowSpec {
//!     device_id: "lamp-1".to_string(),
//!     start: 0,
//!     end: 7200,
//!     bucket_width: BucketUnit::Hour.seconds(),
//!     reducer: "mean".to_string(),
//! };
//! let data = vec![
//!     Measurement::new("lamp-1", 10, 2.0),
//!     Measurement::new("lamp-1", 20, 4.0),
//! ];
//! assert_eq!(bucketize(&data, &window, &Mean), vec![3.0, 0.0]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

/// Prometheus metrics and telemetry
pub mod metrics;

/// Configuration management with TOML support
pub mod config;

/// Bucketing engine, reducers and window specifications
pub mod aggregation;

/// Measurement store abstraction and the in-memory implementation
pub mod storage;

/// Query validation and execution
pub mod query;

/// Clock and the shared per-process service context
pub mod context;

/// Line-socket request protocols (period and JSON-RPC)
pub mod protocol;

/// HTTP and line-socket listeners
pub mod network;

// Re-export main types
pub use context::ServiceContext;
pub use error::{Error, Result};
pub use query::{QueryError, QueryErrorKind, QueryService, RawQuery};
pub use types::{Device, DeviceId, Measurement, TimeRange, Timestamp};
