//! Period requests: `"<device>/<daily|weekly>"`
//!
//! The keyword picks a window ending at the context clock's "now":
//! `daily` covers the last 86400 seconds and `weekly` the last 604800.
//! Bucket units come from the `[periods]` configuration and the reducer
//! from the query defaults.
//!
//! Replies are one line: a JSON array of floats on success, or
//! `{"error": "<message>", "kind": "<Kind>"}` on failure.

use serde::Serialize;
use std::fmt;

use crate::context::ServiceContext;
use crate::query::{QueryError, QueryResult, RawQuery};
use crate::types::{DeviceId, Timestamp};

/// Window keyword of a period request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodKeyword {
    /// Last 24 hours
    Daily,
    /// Last 7 days
    Weekly,
}

impl PeriodKeyword {
    /// Window length in seconds
    pub const fn span_secs(self) -> i64 {
        match self {
            PeriodKeyword::Daily => 24 * 60 * 60,
            PeriodKeyword::Weekly => 7 * 24 * 60 * 60,
        }
    }

    /// Resolve a keyword token
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "daily" => Some(PeriodKeyword::Daily),
            "weekly" => Some(PeriodKeyword::Weekly),
            _ => None,
        }
    }

    /// Wire token
    pub const fn as_str(self) -> &'static str {
        match self {
            PeriodKeyword::Daily => "daily",
            PeriodKeyword::Weekly => "weekly",
        }
    }
}

impl fmt::Display for PeriodKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded period request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodRequest {
    /// Device to aggregate
    pub device_id: DeviceId,
    /// Window keyword
    pub period: PeriodKeyword,
}

impl PeriodRequest {
    /// Parse a request line
    ///
    /// The keyword follows the last `/`, so device ids may themselves
    /// contain slashes.
    pub fn parse(line: &str) -> QueryResult<Self> {
        let line = line.trim();
        let (device, keyword) = line.rsplit_once('/').ok_or_else(|| {
            QueryError::malformed(format!(
                "expected '<device>/<daily|weekly>', got '{}'",
                line
            ))
        })?;

        if device.is_empty() {
            return Err(QueryError::malformed("missing device id"));
        }
        let period = PeriodKeyword::parse(keyword).ok_or_else(|| {
            QueryError::malformed(format!(
                "unknown period '{}', expected 'daily' or 'weekly'",
                keyword
            ))
        })?;

        Ok(Self {
            device_id: device.to_string(),
            period,
        })
    }

    /// Canonical query for this request at time `now`
    pub fn to_query(&self, ctx: &ServiceContext, now: Timestamp) -> RawQuery {
        let per = match self.period {
            PeriodKeyword::Daily => ctx.periods().daily_per,
            PeriodKeyword::Weekly => ctx.periods().weekly_per,
        };
        let start = now.saturating_sub(self.period.span_secs()).max(0);

        RawQuery::new(
            self.device_id.clone(),
            ctx.defaults().reducer.clone(),
            per.as_str(),
        )
        .between(start, now)
    }
}

#[derive(Serialize)]
struct ErrorFrame<'a> {
    error: &'a str,
    kind: &'a str,
}

/// Serialize a query outcome as one reply line (without the newline)
pub fn encode_reply(result: &QueryResult<Vec<f64>>) -> String {
    let encoded = match result {
        Ok(values) => serde_json::to_string(values),
        Err(e) => serde_json::to_string(&ErrorFrame {
            error: &e.message,
            kind: e.kind.as_str(),
        }),
    };

    encoded.unwrap_or_else(|_| {
        r#"{"error":"reply encoding failed","kind":"Internal"}"#.to_string()
    })
}

/// Serve one period request line
pub async fn handle(ctx: &ServiceContext, line: &str) -> QueryResult<Vec<f64>> {
    let request = PeriodRequest::parse(line)?;
    let query = request.to_query(ctx, ctx.now());
    ctx.query().answer(&query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{BucketUnit, ReducerRegistry};
    use crate::context::FixedClock;
    use crate::query::{QueryErrorKind, QueryService};
    use crate::storage::InMemoryStore;
    use std::sync::Arc;

    fn context(now: Timestamp) -> ServiceContext {
        let query = QueryService::new(Arc::new(InMemoryStore::new()), ReducerRegistry::builtin());
        ServiceContext::new(query, Arc::new(FixedClock::new(now)))
    }

    #[test]
    fn test_parse() {
        let req = PeriodRequest::parse("8918593277/daily").unwrap();
        assert_eq!(req.device_id, "8918593277");
        assert_eq!(req.period, PeriodKeyword::Daily);

        let req = PeriodRequest::parse("  site/a/weekly\r\n").unwrap();
        assert_eq!(req.device_id, "site/a");
        assert_eq!(req.period, PeriodKeyword::Weekly);
    }

    #[test]
    fn test_parse_rejects() {
        for line in ["lamp", "/daily", "lamp/monthly", "lamp/", ""] {
            let err = PeriodRequest::parse(line).unwrap_err();
            assert_eq!(err.kind, QueryErrorKind::MalformedRequest, "{:?}", line);
        }
    }

    #[test]
    fn test_to_query_windows() {
        let ctx = context(1_000_000);
        let daily = PeriodRequest::parse("lamp/daily")
            .unwrap()
            .to_query(&ctx, 1_000_000);
        assert_eq!(daily.start.as_deref(), Some("913600"));
        assert_eq!(daily.end.as_deref(), Some("1000000"));
        assert_eq!(daily.per, BucketUnit::Hour.as_str());
        assert_eq!(daily.reducer, "mean");

        let weekly = PeriodRequest::parse("lamp/weekly")
            .unwrap()
            .to_query(&ctx, 1_000_000);
        assert_eq!(weekly.start.as_deref(), Some("395200"));
        assert_eq!(weekly.per, "day");
    }

    #[test]
    fn test_window_clamped_at_epoch() {
        let ctx = context(100);
        let q = PeriodRequest::parse("lamp/daily").unwrap().to_query(&ctx, 100);
        assert_eq!(q.start.as_deref(), Some("0"));
    }

    #[test]
    fn test_encode_reply() {
        assert_eq!(encode_reply(&Ok(vec![0.5, 0.0])), "[0.5,0.0]");
        assert_eq!(encode_reply(&Ok(vec![])), "[]");

        let err = encode_reply(&Err(QueryError::unknown_device("ghost")));
        let value: serde_json::Value = serde_json::from_str(&err).unwrap();
        assert_eq!(value["kind"], "UnknownDevice");
        assert!(value["error"].as_str().unwrap().contains("ghost"));
    }
}
