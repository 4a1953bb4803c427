//! Service context shared by the transport adapters
//!
//! Built once at startup and handed to each adapter as
//! `Arc<ServiceContext>`. Holds the query service, the clock the socket
//! period keywords are anchored to, and the request defaults.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::aggregation::BucketUnit;
use crate::config::{ApplicationConfig, PeriodConfig};
use crate::query::QueryService;
use crate::types::Timestamp;

/// Source of "now" in Unix seconds
pub trait Clock: Send + Sync + 'static {
    /// Current time in seconds since the epoch
    fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp()
    }
}

/// Settable clock for tests and replays
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    /// Clock frozen at `now`
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Move the clock to `now`
    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move the clock forward by `secs`
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Reducer and unit applied when a request leaves them out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefaults {
    /// Default reducer name
    pub reducer: String,
    /// Default bucket unit
    pub per: BucketUnit,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            reducer: "mean".to_string(),
            per: BucketUnit::Hour,
        }
    }
}

/// Everything an adapter needs to serve a request
pub struct ServiceContext {
    query: QueryService,
    clock: Arc<dyn Clock>,
    defaults: QueryDefaults,
    periods: PeriodConfig,
    strict_http_status: bool,
}

impl ServiceContext {
    /// Context with default request settings
    pub fn new(query: QueryService, clock: Arc<dyn Clock>) -> Self {
        Self {
            query,
            clock,
            defaults: QueryDefaults::default(),
            periods: PeriodConfig::default(),
            strict_http_status: false,
        }
    }

    /// Context with request settings taken from configuration
    pub fn from_config(
        query: QueryService,
        clock: Arc<dyn Clock>,
        config: &ApplicationConfig,
    ) -> Self {
        Self::new(query, clock)
            .with_defaults(QueryDefaults {
                reducer: config.query.default_reducer.clone(),
                per: config.query.default_per,
            })
            .with_periods(config.periods.clone())
            .with_strict_http_status(config.query.strict_http_status)
    }

    /// Override the request defaults
    pub fn with_defaults(mut self, defaults: QueryDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Override the period keyword units
    pub fn with_periods(mut self, periods: PeriodConfig) -> Self {
        self.periods = periods;
        self
    }

    /// Map HTTP error kinds to failure statuses
    pub fn with_strict_http_status(mut self, strict: bool) -> Self {
        self.strict_http_status = strict;
        self
    }

    /// The shared query service
    pub fn query(&self) -> &QueryService {
        &self.query
    }

    /// Current time according to the context clock
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Request defaults
    pub fn defaults(&self) -> &QueryDefaults {
        &self.defaults
    }

    /// Period keyword units
    pub fn periods(&self) -> &PeriodConfig {
        &self.periods
    }

    /// Whether HTTP errors carry failure statuses
    pub fn strict_http_status(&self) -> bool {
        self.strict_http_status
    }
}
