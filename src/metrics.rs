//! Metrics and telemetry for the light-level service
//!
//! Prometheus metrics for query throughput, latency, error kinds, store
//! retries and socket connections.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, register_int_counter,
    CounterVec, Encoder, Gauge, HistogramVec, IntCounter, TextEncoder,
};

lazy_static! {
    // === Query Counters ===

    /// Total queries by transport and outcome
    pub static ref QUERIES_TOTAL: CounterVec = register_counter_vec!(
        "lumen_queries_total",
        "Total queries by transport and status",
        &["transport", "status"]
    ).unwrap();

    /// Rejected queries by error kind
    pub static ref QUERY_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "lumen_query_errors_total",
        "Total query errors by kind",
        &["kind"]
    ).unwrap();

    /// Buckets returned across all queries
    pub static ref BUCKETS_PRODUCED: IntCounter = register_int_counter!(
        "lumen_buckets_produced_total",
        "Total buckets produced by the bucketing engine"
    ).unwrap();

    /// Store reads retried after an unavailable store
    pub static ref STORE_RETRIES: IntCounter = register_int_counter!(
        "lumen_store_retries_total",
        "Total store range reads retried"
    ).unwrap();

    // === Latency Histograms ===

    /// Query duration from validation to result
    pub static ref QUERY_DURATION: HistogramVec = register_histogram_vec!(
        "lumen_query_duration_seconds",
        "Query latency in seconds",
        &["reducer"],
        vec![0.0001, 0.001, 0.01, 0.1, 0.5, 1.0]
    ).unwrap();

    // === Resource Gauges ===

    /// Open line-socket connections
    pub static ref SOCKET_CONNECTIONS: Gauge = register_gauge!(
        "lumen_socket_connections",
        "Number of open line-socket connections"
    ).unwrap();

    /// Health status (0=unhealthy, 1=healthy)
    pub static ref HEALTH_STATUS: Gauge = register_gauge!(
        "lumen_health_status",
        "Service health status (0=unhealthy, 1=healthy)"
    ).unwrap();
}

/// Initialize metrics system
pub fn init() {
    HEALTH_STATUS.set(1.0);
    SOCKET_CONNECTIONS.set(0.0);

    tracing::info!("Metrics system initialized");
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

/// Record a completed query
#[inline]
pub fn record_query(transport: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    QUERIES_TOTAL.with_label_values(&[transport, status]).inc();
}

/// Record a query rejected with `kind`
#[inline]
pub fn record_query_error(kind: &str) {
    QUERY_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

/// Record the latency and size of a successful computation
#[inline]
pub fn record_buckets(reducer: &str, buckets: usize, duration_secs: f64) {
    BUCKETS_PRODUCED.inc_by(buckets as u64);
    QUERY_DURATION
        .with_label_values(&[reducer])
        .observe(duration_secs);
}

/// Record a retried store read
#[inline]
pub fn record_store_retry() {
    STORE_RETRIES.inc();
}

/// Track a socket connection opening
#[inline]
pub fn socket_connection_opened() {
    SOCKET_CONNECTIONS.inc();
}

/// Track a socket connection closing
#[inline]
pub fn socket_connection_closed() {
    SOCKET_CONNECTIONS.dec();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        init();
        assert_eq!(HEALTH_STATUS.get(), 1.0);
    }

    #[test]
    fn test_record_query() {
        record_query("http", true);
        record_query_error("UnknownReducer");
        let metrics = gather_metrics().expect("Failed to gather metrics");
        assert!(metrics.contains("lumen_queries_total"));
        assert!(metrics.contains("lumen_query_errors_total"));
    }

    #[test]
    fn test_record_buckets() {
        let before = BUCKETS_PRODUCED.get();
        record_buckets("mean", 24, 0.0005);
        assert!(BUCKETS_PRODUCED.get() >= before + 24);
    }
}
