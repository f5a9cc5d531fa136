//! Operational endpoints: `/health` and `/metrics`.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::health::HealthSnapshot;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
struct HealthBody<'a> {
    #[serde(flatten)]
    snapshot: &'a HealthSnapshot,
    version: &'a str,
    githash: &'a str,
    build: &'a str,
}

/// 200 when every dependency is up, 503 otherwise.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.health.snapshot();
    let status = if snapshot.is_up() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = serde_json::to_value(HealthBody {
        snapshot: &snapshot,
        version: &state.build.version,
        githash: &state.build.githash,
        build: &state.build.build,
    })
    .unwrap_or_default();

    (status, Json(body))
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
