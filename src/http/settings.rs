//! GUI layout settings.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::LayoutConfig;
use crate::http::server::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutSettings {
    pub proxy: String,
    pub online_visible: String,
    pub queue_visible: String,
    pub report_visible: String,
    pub monitoring_visible: String,
}

impl From<&LayoutConfig> for LayoutSettings {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            proxy: config.proxy.clone(),
            online_visible: config.visible.online.clone(),
            queue_visible: config.visible.queue.clone(),
            report_visible: config.visible.report.clone(),
            monitoring_visible: config.visible.monitoring.clone(),
        }
    }
}

pub async fn settings_handler(State(state): State<AppState>) -> Json<LayoutSettings> {
    tracing::debug!(settings = ?state.settings, "Serving layout settings");
    Json(state.settings.as_ref().clone())
}
