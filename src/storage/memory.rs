//! In-memory measurement store
//!
//! The catalog and the series live behind separate `parking_lot` locks.
//! Each series is a `Vec<(timestamp, value)>` kept sorted on insert, so range
//! reads are two binary searches and a copy.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use super::{loader, MeasurementStore, StoreStats};
use crate::config::StorageConfig;
use crate::error::StoreError;
use crate::types::{Device, DeviceId, Measurement, TimeRange, Timestamp};

/// Device catalog plus timestamp-sorted series per device
pub struct InMemoryStore {
    /// Catalog: device_id -> device
    devices: RwLock<HashMap<DeviceId, Device>>,
    /// Series: device_id -> (timestamp, value) sorted by timestamp
    series: RwLock<HashMap<DeviceId, Vec<(Timestamp, f64)>>>,
    /// Statistics
    stats: StoreStatsAtomic,
}

struct StoreStatsAtomic {
    measurements: AtomicU64,
    range_reads: AtomicU64,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            series: RwLock::new(HashMap::new()),
            stats: StoreStatsAtomic {
                measurements: AtomicU64::new(0),
                range_reads: AtomicU64::new(0),
            },
        }
    }

    /// Load the catalog and measurement log named by `config`
    ///
    /// Missing files leave the store empty. A malformed line aborts the load.
    pub fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        let store = Self::new();

        let devices = loader::read_devices(&config.devices_path())?;
        for device in devices {
            store.register_device(device)?;
        }

        let measurements = loader::read_measurements(&config.measurements_path())?;
        store.extend(measurements)?;

        let stats = store.stats();
        info!(
            data_dir = %config.data_dir.display(),
            devices = stats.devices,
            measurements = stats.measurements,
            "Measurement store loaded"
        );
        Ok(store)
    }

    /// Add a device to the catalog
    ///
    /// Registering an identical record twice is a no-op; a different location
    /// under the same id is a conflict.
    pub fn register_device(&self, device: Device) -> Result<(), StoreError> {
        let mut devices = self.devices.write();
        if let Some(existing) = devices.get(&device.id) {
            if existing.same_location(&device) {
                return Ok(());
            }
            return Err(StoreError::DeviceConflict {
                id: existing.id.clone(),
                lat: existing.lat,
                lon: existing.lon,
            });
        }

        debug!(device = %device, "Registered device");
        devices.insert(device.id.clone(), device);
        Ok(())
    }

    /// Append one measurement
    ///
    /// Equal timestamps keep arrival order.
    pub fn append(&self, measurement: Measurement) -> Result<(), StoreError> {
        measurement.validate()?;
        if !self.devices.read().contains_key(&measurement.device_id) {
            return Err(StoreError::UnknownDevice(measurement.device_id));
        }

        let mut series = self.series.write();
        let points = series.entry(measurement.device_id).or_default();
        let ts = measurement.timestamp;
        let pos = points.partition_point(|p| p.0 <= ts);
        points.insert(pos, (ts, measurement.value));

        self.stats.measurements.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Append many measurements, stopping at the first rejected one
    pub fn extend<I>(&self, measurements: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = Measurement>,
    {
        let mut count = 0;
        for measurement in measurements {
            self.append(measurement)?;
            count += 1;
        }
        Ok(count)
    }

    /// Look up a catalog entry
    pub fn device(&self, device_id: &str) -> Option<Device> {
        self.devices.read().get(device_id).cloned()
    }

    /// All catalog entries sorted by id
    pub fn devices(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self.devices.read().values().cloned().collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    fn read_range(&self, device_id: &str, range: TimeRange) -> Vec<Measurement> {
        let series = self.series.read();
        let Some(points) = series.get(device_id) else {
            return Vec::new();
        };

        let lo = points.partition_point(|p| p.0 < range.start);
        let hi = points.partition_point(|p| p.0 <= range.end);
        if lo >= hi {
            return Vec::new();
        }

        points[lo..hi]
            .iter()
            .map(|&(timestamp, value)| Measurement {
                device_id: device_id.to_string(),
                timestamp,
                value,
            })
            .collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MeasurementStore for InMemoryStore {
    fn store_id(&self) -> &str {
        "in-memory-v1"
    }

    async fn range(
        &self,
        device_id: &str,
        range: TimeRange,
    ) -> Result<Vec<Measurement>, StoreError> {
        self.stats.range_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.read_range(device_id, range))
    }

    async fn device_exists(&self, device_id: &str) -> Result<bool, StoreError> {
        Ok(self.devices.read().contains_key(device_id))
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            devices: self.devices.read().len() as u64,
            measurements: self.stats.measurements.load(Ordering::Relaxed),
            range_reads: self.stats.range_reads.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_lamp() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .register_device(Device::new("lamp", 56.0, 10.0))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_range_is_sorted_and_inclusive() {
        let store = store_with_lamp();
        for ts in [300, 100, 200, 0, 400] {
            store
                .append(Measurement::new("lamp", ts, ts as f64 / 100.0))
                .unwrap();
        }

        let rows = store
            .range("lamp", TimeRange::new(100, 300).unwrap())
            .await
            .unwrap();
        let timestamps: Vec<_> = rows.iter().map(|m| m.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200, 300]);
        assert!(rows.iter().all(|m| m.device_id == "lamp"));
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_arrival_order() {
        let store = store_with_lamp();
        store.append(Measurement::new("lamp", 10, 1.0)).unwrap();
        store.append(Measurement::new("lamp", 10, 2.0)).unwrap();
        store.append(Measurement::new("lamp", 5, 0.5)).unwrap();

        let rows = store
            .range("lamp", TimeRange::new(0, 10).unwrap())
            .await
            .unwrap();
        let values: Vec<_> = rows.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![0.5, 1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_range_outside_series_is_empty() {
        let store = store_with_lamp();
        store.append(Measurement::new("lamp", 50, 1.0)).unwrap();

        let rows = store
            .range("lamp", TimeRange::new(100, 200).unwrap())
            .await
            .unwrap();
        assert!(rows.is_empty());

        let rows = store
            .range("ghost", TimeRange::new(0, 200).unwrap())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_append_rejects_invalid() {
        let store = store_with_lamp();
        assert!(matches!(
            store.append(Measurement::new("lamp", 1, -1.0)),
            Err(StoreError::InvalidMeasurement { .. })
        ));
        assert!(matches!(
            store.append(Measurement::new("ghost", 1, 1.0)),
            Err(StoreError::UnknownDevice(_))
        ));
        assert_eq!(store.stats().measurements, 0);
    }

    #[test]
    fn test_device_registration() {
        let store = store_with_lamp();
        assert!(store
            .register_device(Device::new("lamp", 56.0, 10.0))
            .is_ok());
        assert!(matches!(
            store.register_device(Device::new("lamp", 57.0, 10.0)),
            Err(StoreError::DeviceConflict { .. })
        ));
        assert_eq!(store.devices().len(), 1);
        assert_eq!(store.device("lamp").unwrap().lat, 56.0);
    }

    #[tokio::test]
    async fn test_stats() {
        let store = store_with_lamp();
        store
            .register_device(Device::new("other", 1.0, 1.0))
            .unwrap();
        store
            .extend(vec![
                Measurement::new("lamp", 1, 1.0),
                Measurement::new("other", 2, 2.0),
            ])
            .unwrap();
        store
            .range("lamp", TimeRange::new(0, 10).unwrap())
            .await
            .unwrap();

        let stats = store.stats();
        assert_eq!(stats.devices, 2);
        assert_eq!(stats.measurements, 2);
        assert_eq!(stats.range_reads, 1);
        assert_eq!(stats.measurements_per_device(), 1.0);
        assert!(store.device_exists("other").await.unwrap());
        assert!(!store.device_exists("ghost").await.unwrap());
    }
}
