//! Metrics collection and exposition.
//!
//! # Metrics
//! - `service_up` (gauge): 1=up, 0=down per dependency scope, plus `general`
//!   for the composite; labels scope, destination, version, githash, build
//! - `api_request_duration_seconds` (histogram): traffic listener latency;
//!   labels url (route pattern), code, method
//!
//! The Prometheus recorder is process-global and installed once; every
//! gateway in the process shares it and `/metrics` renders it.

use std::sync::Mutex;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

use crate::observability::BuildInfo;

pub const SERVICE_UP: &str = "service_up";
pub const REQUEST_DURATION: &str = "api_request_duration_seconds";

/// Scope of the composite gauge.
pub const GENERAL_SCOPE: &str = "general";

const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

static HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Builder with the gateway's histogram buckets.
pub fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), DURATION_BUCKETS)
}

/// Install the global recorder, or return the one already installed.
pub fn install() -> Result<PrometheusHandle, BuildError> {
    let mut guard = HANDLE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(handle) = guard.as_ref() {
        return Ok(handle.clone());
    }

    let handle = builder()?.install_recorder()?;
    describe();
    *guard = Some(handle.clone());
    Ok(handle)
}

fn describe() {
    metrics::describe_gauge!(SERVICE_UP, "Common metric of state of available service and subservices");
    metrics::describe_histogram!(
        REQUEST_DURATION,
        metrics::Unit::Seconds,
        "Distribution of api request-response durations in seconds"
    );
}

/// Set the up/down gauge of one scope.
pub fn set_service_up(scope: &str, destination: &str, build: &BuildInfo, up: bool) {
    metrics::gauge!(
        SERVICE_UP,
        "scope" => scope.to_string(),
        "destination" => destination.to_string(),
        "version" => build.version.clone(),
        "githash" => build.githash.clone(),
        "build" => build.build.clone(),
    )
    .set(if up { 1.0 } else { 0.0 });
}

/// Record one served request.
pub fn record_request(url: &str, status: u16, method: &str, start: Instant) {
    metrics::histogram!(
        REQUEST_DURATION,
        "url" => url.to_string(),
        "code" => status.to_string(),
        "method" => method.to_string(),
    )
    .record(start.elapsed().as_secs_f64());
}

/// Route-level middleware feeding the request duration histogram.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let url = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;

    record_request(&url, response.status().as_u16(), &method, start);
    response
}
