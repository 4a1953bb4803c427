//! Measurement store
//!
//! Holds the device catalog and the per-device measurement series the query
//! service reads from.
//!
//! # Architecture
//!
//! ```text
//! devices.jsonl ──┐
//!                 ├─→ loader ─→ InMemoryStore ─→ MeasurementStore::range
//! measurements.jsonl ┘           (RwLock)          (sorted, inclusive)
//! ```
//!
//! # Key Components
//!
//! - **MeasurementStore**: Read-only contract used by the query service
//! - **InMemoryStore**: Catalog plus timestamp-sorted series per device
//! - **Loader**: JSON-lines catalog and measurement log parsing
//!
//! # Example
//!
//! ```rust
//! use lumen_tsdb::storage::{InMemoryStore, MeasurementStore};
//! use lumen_tsdb::types::{Device, Measurement, TimeRange};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryStore::new();
//! store.register_device(Device::new("lamp", 56.1, 10.2))?;
//! store.append(Measurement::new("lamp", 120, 0.4))?;
//! store.append(Measurement::new("lamp", 60, 0.2))?;
//!
//! let rows = store.range("lamp", TimeRange::new(0, 3600).unwrap()).await?;
//! assert_eq!(rows[0].timestamp, 60);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{Measurement, TimeRange};

/// Read contract between the query service and the store
///
/// `range` must return measurements with `range.start <= timestamp <=
/// range.end`, ascending by timestamp. Implementations may be read
/// concurrently.
#[async_trait]
pub trait MeasurementStore: Send + Sync + 'static {
    /// Identifier of this store backend
    fn store_id(&self) -> &str;

    /// Measurements of one device within an inclusive time range
    async fn range(
        &self,
        device_id: &str,
        range: TimeRange,
    ) -> Result<Vec<Measurement>, StoreError>;

    /// Whether the device is present in the catalog
    async fn device_exists(&self, device_id: &str) -> Result<bool, StoreError>;

    /// Get store statistics
    fn stats(&self) -> StoreStats;
}

/// Store statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Devices in the catalog
    pub devices: u64,
    /// Measurements across all devices
    pub measurements: u64,
    /// Range reads served
    pub range_reads: u64,
}

impl StoreStats {
    /// Average measurements per device, 0.0 for an empty catalog
    pub fn measurements_per_device(&self) -> f64 {
        if self.devices == 0 {
            0.0
        } else {
            self.measurements as f64 / self.devices as f64
        }
    }
}
