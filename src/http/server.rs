//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the shared outbound client
//! - Build the traffic router (`/v2/*` proxied behind the auth gate,
//!   `/v1/layout/settings`)
//! - Build the operational router (`/health`, `/metrics`)
//! - Wire up middleware (panic guard, request ID, tracing, body limit, timeout)

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderName, Request},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::AuthGate;
use crate::config::{GatewayConfig, ProxyConfig};
use crate::health::HealthBoard;
use crate::http::middleware::auth_gate_middleware;
use crate::http::ops::{health_handler, metrics_handler};
use crate::http::proxy::proxy_handler;
use crate::http::response::ApiError;
use crate::http::settings::{settings_handler, LayoutSettings};
use crate::load_balancer::TargetPool;
use crate::observability::{metrics, BuildInfo};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub build: BuildInfo,
    pub client: reqwest::Client,
    pub auth: Arc<AuthGate>,
    pub targets: Arc<TargetPool>,
    pub health: Arc<HealthBoard>,
    pub metrics: PrometheusHandle,
    pub settings: Arc<LayoutSettings>,
    pub body_limit: usize,
}

/// Shared outbound client: bounded idle pool, fixed timeouts. Environment
/// proxy settings are ignored; upstreams are dialed directly.
pub fn build_client(config: &ProxyConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(config.timeout())
        .pool_max_idle_per_host(config.max_idle_conns)
        .pool_idle_timeout(config.timeout())
        .danger_accept_invalid_certs(config.insecure_skip_verify)
        .build()
}

/// Main listener router.
#[allow(deprecated)]
pub fn traffic_router(state: AppState) -> Router {
    // Outer bound only; the proxy client and the auth stages time out first.
    let request_timeout = state.config.proxy.timeout()
        + state.config.session.timeout()
        + state.config.permissions.timeout()
        + Duration::from_secs(1);
    let body_limit = state.body_limit;

    let api = Router::new()
        .route("/v2", any(proxy_handler))
        .route("/v2/{*path}", any(proxy_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_gate_middleware));

    Router::new()
        .merge(api)
        .route("/v1/layout/settings", get(settings_handler))
        .route_layer(middleware::from_fn(metrics::track_requests))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                // The timeout needs a `Default` response body, so it sits inside the limit.
                .layer(RequestBodyLimitLayer::new(body_limit))
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

/// Operational listener router.
pub fn ops_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(TraceLayer::new_for_http()),
        )
}

fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Handler panicked");
    ApiError::Internal(detail).into_response()
}
