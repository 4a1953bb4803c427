//! Canonical query request
//!
//! Every transport adapter decodes its own wire shape into a [`RawQuery`].
//! Fields stay as the caller sent them so that all validation happens in
//! one place, the query service.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{DeviceId, Timestamp};

/// Unvalidated windowed-aggregation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuery {
    /// Device to aggregate
    pub device_id: DeviceId,
    /// Reducer name
    pub reducer: String,
    /// Bucket unit token
    pub per: String,
    /// Window start as sent, if any
    pub start: Option<String>,
    /// Window end as sent, if any
    pub end: Option<String>,
}

impl RawQuery {
    /// Request without bounds
    pub fn new(
        device_id: impl Into<DeviceId>,
        reducer: impl Into<String>,
        per: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            reducer: reducer.into(),
            per: per.into(),
            start: None,
            end: None,
        }
    }

    /// Set raw bound strings
    pub fn with_bounds(mut self, start: Option<String>, end: Option<String>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Set integer bounds
    pub fn between(self, start: Timestamp, end: Timestamp) -> Self {
        self.with_bounds(Some(start.to_string()), Some(end.to_string()))
    }
}

impl fmt::Display for RawQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reducer={} per={} start={} end={}",
            self.device_id,
            self.reducer,
            self.per,
            self.start.as_deref().unwrap_or("-"),
            self.end.as_deref().unwrap_or("-"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let q = RawQuery::new("lamp", "mean", "hour").between(0, 3600);
        assert_eq!(q.start.as_deref(), Some("0"));
        assert_eq!(q.end.as_deref(), Some("3600"));
        assert_eq!(q.to_string(), "lamp reducer=mean per=hour start=0 end=3600");

        let q = RawQuery::new("lamp", "mean", "hour");
        assert_eq!(q.to_string(), "lamp reducer=mean per=hour start=- end=-");
    }
}
