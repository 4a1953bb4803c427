//! Query service
//!
//! The single entry point shared by every transport. A call validates the
//! request, reads the device's range from the store once, runs the
//! bucketing engine and returns its output unchanged. Nothing is cached
//! between calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use super::error::{QueryError, QueryResult};
use super::request::RawQuery;
use crate::aggregation::{bucketize, BucketUnit, Reducer, ReducerRegistry, WindowSpec};
use crate::config::QueryConfig;
use crate::error::StoreError;
use crate::metrics;
use crate::storage::MeasurementStore;
use crate::types::{Timestamp, TimeRange};

/// Bucket limit used when no configuration is supplied
pub const DEFAULT_MAX_BUCKETS: usize = 100_000;

/// Validates, reads and buckets windowed-aggregation queries
pub struct QueryService {
    store: Arc<dyn MeasurementStore>,
    reducers: ReducerRegistry,
    max_store_retries: u32,
    max_buckets: usize,
}

impl QueryService {
    /// Create a service over `store` that never retries store reads
    pub fn new(store: Arc<dyn MeasurementStore>, reducers: ReducerRegistry) -> Self {
        Self {
            store,
            reducers,
            max_store_retries: 0,
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }

    /// Create a service using the retry policy from configuration
    pub fn from_config(
        store: Arc<dyn MeasurementStore>,
        reducers: ReducerRegistry,
        config: &QueryConfig,
    ) -> Self {
        Self::new(store, reducers)
            .with_max_store_retries(config.max_store_retries)
            .with_max_buckets(config.max_buckets)
    }

    /// Allow up to one retry after a store failure
    pub fn with_max_store_retries(mut self, retries: u32) -> Self {
        self.max_store_retries = retries.min(1);
        self
    }

    /// Reject windows that would produce more than `max` buckets
    pub fn with_max_buckets(mut self, max: usize) -> Self {
        self.max_buckets = max;
        self
    }

    /// Registry the service resolves reducer names against
    pub fn reducers(&self) -> &ReducerRegistry {
        &self.reducers
    }

    /// Store backing the service
    pub fn store(&self) -> &Arc<dyn MeasurementStore> {
        &self.store
    }

    /// Answer a query with one reduced value per bucket
    pub async fn answer(&self, raw: &RawQuery) -> QueryResult<Vec<f64>> {
        let result = self.answer_inner(raw).await;
        if let Err(e) = &result {
            metrics::record_query_error(e.kind.as_str());
            debug!(query = %raw, kind = %e.kind, error = %e.message, "Query rejected");
        }
        result
    }

    async fn answer_inner(&self, raw: &RawQuery) -> QueryResult<Vec<f64>> {
        let (window, reducer) = self.validate(raw)?;

        let exists = self
            .with_store_retry(|| self.store.device_exists(&window.device_id))
            .await?;
        if !exists {
            return Err(QueryError::unknown_device(&window.device_id));
        }

        let started = Instant::now();
        let range = TimeRange {
            start: window.start,
            end: window.end,
        };
        let measurements = self
            .with_store_retry(|| self.store.range(&window.device_id, range))
            .await?;

        let buckets = bucketize(&measurements, &window, reducer.as_ref());
        debug_assert_eq!(buckets.len(), window.bucket_count());

        metrics::record_buckets(
            reducer.name(),
            buckets.len(),
            started.elapsed().as_secs_f64(),
        );
        debug!(
            window = %window,
            measurements = measurements.len(),
            buckets = buckets.len(),
            "Query answered"
        );

        Ok(buckets)
    }

    /// Run the store-free validation steps
    ///
    /// Checks, in order: reducer, bucket unit, bound presence and syntax,
    /// bound ordering, bucket limit. Device existence needs the store and is checked by
    /// [`QueryService::answer`].
    pub fn validate(&self, raw: &RawQuery) -> QueryResult<(WindowSpec, Arc<dyn Reducer>)> {
        let reducer = self
            .reducers
            .resolve(&raw.reducer)
            .ok_or_else(|| QueryError::unknown_reducer(&raw.reducer))?;

        let unit =
            BucketUnit::parse(&raw.per).ok_or_else(|| QueryError::unknown_bucket_unit(&raw.per))?;

        let start_raw = raw
            .start
            .as_deref()
            .ok_or_else(|| QueryError::missing_bound("start"))?;
        let end_raw = raw
            .end
            .as_deref()
            .ok_or_else(|| QueryError::missing_bound("end"))?;
        let start = parse_bound("start", start_raw)?;
        let end = parse_bound("end", end_raw)?;

        if start > end {
            return Err(QueryError::invalid_range(start, end));
        }

        let window = WindowSpec {
            device_id: raw.device_id.clone(),
            start,
            end,
            bucket_width: unit.seconds(),
            reducer: reducer.name().to_string(),
        };

        let buckets = window.bucket_count();
        if buckets > self.max_buckets {
            return Err(QueryError::too_many_buckets(buckets, self.max_buckets));
        }
        Ok((window, reducer))
    }

    async fn with_store_retry<T, F, Fut>(&self, op: F) -> QueryResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_unavailable() && attempt < self.max_store_retries => {
                    attempt += 1;
                    metrics::record_store_retry();
                    warn!(error = %e, attempt, "Store read failed, retrying");
                }
                Err(e) if e.is_unavailable() => {
                    error!(error = %e, store = self.store.store_id(), "Store read failed");
                    return Err(QueryError::store_unavailable(e));
                }
                Err(e) => {
                    error!(
                        error = %e,
                        store = self.store.store_id(),
                        "Store returned an unexpected error"
                    );
                    return Err(
                        QueryError::internal(format!("store error: {}", e)).with_source(e)
                    );
                }
            }
        }
    }
}

/// Parse a non-negative integer bound
fn parse_bound(name: &str, raw: &str) -> QueryResult<Timestamp> {
    match raw.trim().parse::<Timestamp>() {
        Ok(value) if value >= 0 => Ok(value),
        _ => Err(QueryError::invalid_bound(name, raw)),
    }
}
