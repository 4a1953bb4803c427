//! Windowed Aggregation Engine
//!
//! Turns a device's raw light-level series into a fixed-length vector of
//! bucket aggregates.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │            WindowSpec               │
//! │  device + [start, end] + width      │
//! └─────────────────────────────────────┘
//!                  ↓
//! ┌─────────────────────────────────────┐
//! │           BucketSweep               │
//! │  two-cursor forward partition       │
//! └─────────────────────────────────────┘
//!                  ↓
//! ┌─────────────────────────────────────┐
//! │        Reducer (by name)            │
//! │  mean / median / min / max / sum    │
//! └─────────────────────────────────────┘
//!                  ↓
//! ┌─────────────────────────────────────┐
//! │      Vec<f64> of bucket_count       │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Key Components
//!
//! - **Reducers**: Pure `&[f64] -> f64` functions behind the [`Reducer`] trait
//! - **Reducer Registry**: Name lookup, populated once at startup
//! - **Window**: Bucket geometry and the named [`BucketUnit`] widths
//! - **Bucketing**: The sweep itself, independent of any reducer

pub mod bucket;
pub mod reducers;
pub mod window;

pub use bucket::{bucketize, BucketSpan, BucketSweep};
pub use reducers::{Max, Mean, Median, Min, Reducer, ReducerRegistry, Sum};
pub use window::{BucketUnit, WindowSpec};
