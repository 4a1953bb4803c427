//! Query error types
//!
//! Every rejected query produces exactly one `QueryError` whose kind tells
//! the caller which validation step or store access failed.

use std::fmt;

use crate::error::StoreError;

/// Query error with context
#[derive(Debug)]
pub struct QueryError {
    /// Error kind for programmatic handling
    pub kind: QueryErrorKind,
    /// Human-readable message
    pub message: String,
    /// Optional source error
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl QueryError {
    /// Create a new query error
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Add source error for error chaining
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Reducer name is not registered
    pub fn unknown_reducer(name: &str) -> Self {
        Self::new(
            QueryErrorKind::UnknownReducer,
            format!("unknown reducer '{}'", name),
        )
    }

    /// Bucket unit token is not recognised
    pub fn unknown_bucket_unit(token: &str) -> Self {
        Self::new(
            QueryErrorKind::UnknownBucketUnit,
            format!("unknown bucket unit '{}'", token),
        )
    }

    /// A window bound was not supplied
    pub fn missing_bound(name: &str) -> Self {
        Self::new(QueryErrorKind::MissingBound, format!("missing '{}'", name))
    }

    /// A window bound is not a non-negative integer
    pub fn invalid_bound(name: &str, raw: &str) -> Self {
        Self::new(
            QueryErrorKind::InvalidBound,
            format!("'{}' must be a non-negative integer, got '{}'", name, raw),
        )
    }

    /// `start` is after `end`
    pub fn invalid_range(start: i64, end: i64) -> Self {
        Self::new(
            QueryErrorKind::InvalidRange,
            format!("start {} is after end {}", start, end),
        )
    }

    /// The window would produce more buckets than allowed
    pub fn too_many_buckets(buckets: usize, max: usize) -> Self {
        Self::new(
            QueryErrorKind::InvalidRange,
            format!(
                "window spans {} buckets, at most {} allowed; narrow the range or use a wider unit",
                buckets, max
            ),
        )
    }

    /// Device is absent from the catalog
    pub fn unknown_device(device_id: &str) -> Self {
        Self::new(
            QueryErrorKind::UnknownDevice,
            format!("unknown device '{}'", device_id),
        )
    }

    /// Store could not be read
    pub fn store_unavailable(source: StoreError) -> Self {
        Self::new(QueryErrorKind::StoreUnavailable, source.to_string()).with_source(source)
    }

    /// Transport payload could not be decoded into a query
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::MalformedRequest, message)
    }

    /// Unexpected failure inside the service
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::Internal, message)
    }

    /// Whether a retry could succeed
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Categories of query errors for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryErrorKind {
    /// Reducer name did not resolve in the registry
    UnknownReducer,
    /// `per` token is not a known bucket unit
    UnknownBucketUnit,
    /// `start` or `end` absent
    MissingBound,
    /// `start` or `end` not a non-negative integer
    InvalidBound,
    /// `start > end`
    InvalidRange,
    /// Device not in the catalog
    UnknownDevice,
    /// Store I/O failure
    StoreUnavailable,
    /// Transport-level decoding failure
    MalformedRequest,
    /// Internal error (bug, unexpected state)
    Internal,
}

impl QueryErrorKind {
    /// Stable name used in logs, metrics and error payloads
    pub const fn as_str(self) -> &'static str {
        match self {
            QueryErrorKind::UnknownReducer => "UnknownReducer",
            QueryErrorKind::UnknownBucketUnit => "UnknownBucketUnit",
            QueryErrorKind::MissingBound => "MissingBound",
            QueryErrorKind::InvalidBound => "InvalidBound",
            QueryErrorKind::InvalidRange => "InvalidRange",
            QueryErrorKind::UnknownDevice => "UnknownDevice",
            QueryErrorKind::StoreUnavailable => "StoreUnavailable",
            QueryErrorKind::MalformedRequest => "MalformedRequest",
            QueryErrorKind::Internal => "Internal",
        }
    }

    /// Only store unavailability is transient
    pub const fn is_retryable(self) -> bool {
        matches!(self, QueryErrorKind::StoreUnavailable)
    }

    /// Whether the caller's input caused the failure
    pub const fn is_validation(self) -> bool {
        matches!(
            self,
            QueryErrorKind::UnknownReducer
                | QueryErrorKind::UnknownBucketUnit
                | QueryErrorKind::MissingBound
                | QueryErrorKind::InvalidBound
                | QueryErrorKind::InvalidRange
                | QueryErrorKind::MalformedRequest
        )
    }
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias for query operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = QueryError::unknown_reducer("mode");
        assert_eq!(err.kind, QueryErrorKind::UnknownReducer);
        assert!(err.message.contains("mode"));
    }

    #[test]
    fn test_error_display() {
        let err = QueryError::invalid_range(100, 50);
        let display = format!("{}", err);
        assert!(display.contains("InvalidRange"));
        assert!(display.contains("100"));
    }

    #[test]
    fn test_error_with_source() {
        use std::error::Error;
        let err = QueryError::store_unavailable(StoreError::Unavailable("locked".into()));
        assert!(err.source().is_some());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_kind_classification() {
        assert!(QueryErrorKind::InvalidBound.is_validation());
        assert!(!QueryErrorKind::InvalidBound.is_retryable());
        assert!(!QueryErrorKind::UnknownDevice.is_validation());
        assert!(!QueryErrorKind::StoreUnavailable.is_validation());
        assert!(QueryErrorKind::StoreUnavailable.is_retryable());
    }
}
