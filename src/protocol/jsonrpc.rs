//! JSON-RPC 2.0 requests over the line socket
//!
//! ```text
//! {"jsonrpc":"2.0","method":"lightlevel",
//!  "params":{"streetlamp":"8918593277","reducer":"mean","per":"hour",
//!            "from":"2024-01-01T00:00:00Z","to":1704153600},
//!  "id":1}
//! ```
//!
//! `streetlamp` may be a string or a number. `from` and `to` accept Unix
//! seconds (as numbers or numeric strings) and RFC 3339 / ISO-8601
//! timestamps; a timestamp without an offset is read as UTC. Values in any
//! other shape are passed through untouched so the query service reports
//! them as invalid bounds. `reducer` and `per` fall back to the configured
//! defaults.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::context::ServiceContext;
use crate::query::{QueryError, QueryErrorKind, QueryResult, RawQuery};

/// Method name served by the socket
pub const METHOD_LIGHTLEVEL: &str = "lightlevel";

/// Invalid JSON
pub const PARSE_ERROR: i64 = -32700;
/// Not a valid request object
pub const INVALID_REQUEST: i64 = -32600;
/// Unknown method
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Parameter or query validation failure
pub const INVALID_PARAMS: i64 = -32602;
/// Unexpected server failure
pub const INTERNAL_ERROR: i64 = -32603;
/// Store could not be read
pub const STORE_UNAVAILABLE: i64 = -32000;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// JSON-RPC response object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`
    pub jsonrpc: &'static str,
    /// Bucket values on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<f64>>,
    /// Error on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Echo of the request id, `null` when it could not be read
    pub id: Value,
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcError {
    /// Numeric error code
    pub code: i64,
    /// Human-readable message
    pub message: String,
    /// `{"kind": "<QueryErrorKind>"}`
    pub data: ErrorData,
}

/// Machine-readable error detail
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorData {
    /// Query error kind name
    pub kind: &'static str,
}

impl JsonRpcResponse {
    /// Successful response
    pub fn success(id: Value, values: Vec<f64>) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(values),
            error: None,
            id,
        }
    }

    /// Error response with an explicit code
    pub fn failure(id: Value, code: i64, err: &QueryError) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(JsonRpcError {
                code,
                message: err.message.clone(),
                data: ErrorData {
                    kind: err.kind.as_str(),
                },
            }),
            id,
        }
    }

    /// Error response with the code derived from the error kind
    pub fn from_query_error(id: Value, err: &QueryError) -> Self {
        Self::failure(id, error_code(err.kind), err)
    }

    /// Serialize as one reply line (without the newline)
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"jsonrpc":"2.0","error":{{"code":{},"message":"reply encoding failed","data":{{"kind":"Internal"}}}},"id":null}}"#,
                INTERNAL_ERROR
            )
        })
    }

    /// Whether the response carries a result
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// JSON-RPC code for a query error kind
pub fn error_code(kind: QueryErrorKind) -> i64 {
    match kind {
        QueryErrorKind::StoreUnavailable => STORE_UNAVAILABLE,
        QueryErrorKind::Internal => INTERNAL_ERROR,
        _ => INVALID_PARAMS,
    }
}

/// Request that failed before reaching the query service
#[derive(Debug)]
pub struct Rejected {
    /// Request id, `null` when unknown
    pub id: Value,
    /// JSON-RPC code
    pub code: i64,
    /// Cause
    pub error: QueryError,
}

impl Rejected {
    fn new(id: &Value, code: i64, error: QueryError) -> Self {
        Self {
            id: id.clone(),
            code,
            error,
        }
    }

    /// Response for this rejection
    pub fn into_response(self) -> JsonRpcResponse {
        JsonRpcResponse::failure(self.id, self.code, &self.error)
    }
}

/// Decode a request line into its id and canonical query
pub fn decode(line: &str, ctx: &ServiceContext) -> Result<(Value, RawQuery), Rejected> {
    let null = Value::Null;
    let value: Value = serde_json::from_str(line.trim()).map_err(|e| {
        Rejected::new(
            &null,
            PARSE_ERROR,
            QueryError::malformed(format!("invalid JSON: {}", e)),
        )
    })?;

    let Value::Object(request) = value else {
        return Err(Rejected::new(
            &null,
            INVALID_REQUEST,
            QueryError::malformed("request must be a JSON object"),
        ));
    };
    let id = request.get("id").cloned().unwrap_or(Value::Null);

    if request.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(Rejected::new(
            &id,
            INVALID_REQUEST,
            QueryError::malformed("'jsonrpc' must be \"2.0\""),
        ));
    }
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Rejected::new(
                &id,
                INVALID_REQUEST,
                QueryError::malformed("'method' must be a string"),
            )
        })?;
    if method != METHOD_LIGHTLEVEL {
        return Err(Rejected::new(
            &id,
            METHOD_NOT_FOUND,
            QueryError::malformed(format!("unknown method '{}'", method)),
        ));
    }

    let empty = Map::new();
    let params = match request.get("params") {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(params)) => params,
        Some(_) => {
            return Err(Rejected::new(
                &id,
                INVALID_PARAMS,
                QueryError::malformed("'params' must be an object"),
            ))
        }
    };

    let query = decode_params(params, ctx).map_err(|e| Rejected::new(&id, INVALID_PARAMS, e))?;
    Ok((id, query))
}

fn decode_params(params: &Map<String, Value>, ctx: &ServiceContext) -> QueryResult<RawQuery> {
    let device_id = match params.get("streetlamp") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(QueryError::malformed(
                "'streetlamp' must be a string or a number",
            ))
        }
    };

    let reducer = optional_str(params, "reducer")?
        .unwrap_or_else(|| ctx.defaults().reducer.clone());
    let per = optional_str(params, "per")?
        .unwrap_or_else(|| ctx.defaults().per.as_str().to_string());

    Ok(RawQuery::new(device_id, reducer, per)
        .with_bounds(normalize_bound(params.get("from")), normalize_bound(params.get("to"))))
}

fn optional_str(params: &Map<String, Value>, key: &str) -> QueryResult<Option<String>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(QueryError::malformed(format!("'{}' must be a string", key))),
    }
}

/// Normalize a `from`/`to` value to Unix seconds where possible
///
/// Absent or `null` is `None`. Unrecognised shapes are returned verbatim.
pub fn normalize_bound(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(
            parse_timestamp(s)
                .map(|ts| ts.to_string())
                .unwrap_or_else(|| s.clone()),
        ),
        other => Some(other.to_string()),
    }
}

/// Parse Unix seconds or an ISO-8601 timestamp
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

/// Serve one JSON-RPC request line
pub async fn handle(ctx: &ServiceContext, line: &str) -> JsonRpcResponse {
    match decode(line, ctx) {
        Ok((id, query)) => match ctx.query().answer(&query).await {
            Ok(values) => JsonRpcResponse::success(id, values),
            Err(e) => JsonRpcResponse::from_query_error(id, &e),
        },
        Err(rejected) => rejected.into_response(),
    }
}
