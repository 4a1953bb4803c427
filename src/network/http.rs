//! HTTP adapter
//!
//! `GET /device/:id/lightlevels?reducer=&per=&start=&end=` answers with a
//! JSON array of bucket values. Validation and store failures come back as
//! `{"error": "<message>"}` with status 200 unless strict status mapping
//! is enabled on the [`ServiceContext`].

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::context::ServiceContext;
use crate::metrics;
use crate::query::{QueryError, QueryErrorKind, RawQuery};

/// Query string of the light-level endpoint
#[derive(Debug, Default)]
pub struct LightLevelParams {
    /// Reducer name, defaults to the configured reducer
    pub reducer: Option<String>,
    /// Bucket unit, defaults to the configured unit
    pub per: Option<String>,
    /// Window start, unix seconds
    pub start: Option<String>,
    /// Window end, unix seconds
    pub end: Option<String>,
}

impl LightLevelParams {
    /// Collect parameters from raw query pairs
    ///
    /// The first occurrence of a repeated key wins. Unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "reducer" => &mut params.reducer,
                "per" => &mut params.per,
                "start" => &mut params.start,
                "end" => &mut params.end,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }

    /// Canonical query for `device_id`
    ///
    /// Empty `start`/`end` values count as absent.
    pub fn into_query(self, device_id: String, ctx: &ServiceContext) -> RawQuery {
        let defaults = ctx.defaults();
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        RawQuery::new(
            device_id,
            self.reducer.unwrap_or_else(|| defaults.reducer.clone()),
            self.per.unwrap_or_else(|| defaults.per.as_str().to_string()),
        )
        .with_bounds(present(self.start), present(self.end))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Status code for a failed query
///
/// The compatibility mode always answers 200.
pub fn status_for(kind: QueryErrorKind, strict: bool) -> StatusCode {
    if !strict {
        return StatusCode::OK;
    }
    match kind {
        QueryErrorKind::UnknownDevice => StatusCode::NOT_FOUND,
        QueryErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        QueryErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        kind if kind.is_validation() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: QueryError, strict: bool) -> Response {
    let status = status_for(err.kind, strict);
    (status, Json(ErrorBody { error: err.message })).into_response()
}

/// Light levels for one device
async fn light_levels(
    State(ctx): State<Arc<ServiceContext>>,
    Path(device_id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let query = LightLevelParams::from_pairs(pairs).into_query(device_id, &ctx);
    debug!(query = %query, "HTTP light-level request");

    let result = ctx.query().answer(&query).await;
    metrics::record_query("http", result.is_ok());

    match result {
        Ok(values) => Json(values).into_response(),
        Err(err) => error_response(err, ctx.strict_http_status()),
    }
}

/// Health check endpoint
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus text exposition
async fn prometheus_metrics() -> Response {
    match metrics::gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// CORS layer for the configured origins, any origin when empty
pub fn build_cors_layer(cors_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    if cors_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}

/// Build the HTTP router
pub fn build_router(ctx: Arc<ServiceContext>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .route("/device/:id/lightlevels", get(light_levels))
        // Path used by older dashboards
        .route("/streetlamp/:id/lightlevels", get(light_levels))
        .with_state(ctx)
        .layer(build_cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::ReducerRegistry;
    use crate::context::FixedClock;
    use crate::query::QueryService;
    use crate::storage::InMemoryStore;

    fn context() -> ServiceContext {
        let store = InMemoryStore::new();
        let query = QueryService::new(Arc::new(store), ReducerRegistry::builtin());
        ServiceContext::new(query, Arc::new(FixedClock::new(0)))
    }

    #[test]
    fn test_params_use_defaults() {
        let ctx = context();
        let query = LightLevelParams {
            start: Some("0".to_string()),
            end: Some("".to_string()),
            ..Default::default()
        }
        .into_query("lamp".to_string(), &ctx);

        assert_eq!(query.reducer, "mean");
        assert_eq!(query.per, "hour");
        assert_eq!(query.start.as_deref(), Some("0"));
        assert_eq!(query.end, None);
    }

    #[test]
    fn test_repeated_keys_keep_first_value() {
        let pairs = [
            ("start", "0"),
            ("start", "1"),
            ("end", "3600"),
            ("reducer", "max"),
            ("reducer", "min"),
            ("colour", "blue"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()));

        let params = LightLevelParams::from_pairs(pairs);
        assert_eq!(params.start.as_deref(), Some("0"));
        assert_eq!(params.end.as_deref(), Some("3600"));
        assert_eq!(params.reducer.as_deref(), Some("max"));
        assert_eq!(params.per, None);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(QueryErrorKind::UnknownDevice, false), StatusCode::OK);
        assert_eq!(
            status_for(QueryErrorKind::InvalidRange, true),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(QueryErrorKind::UnknownDevice, true),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(QueryErrorKind::StoreUnavailable, true),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
