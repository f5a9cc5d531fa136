//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, weights in 1..=MAX_TARGET_WEIGHT)
//! - Check that each selected backend has what it needs (URLs, DSN)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, PermissionSource, RepositoryKind, SessionSource};

/// Upper bound on a target weight; the balancer expands weights into a schedule.
pub const MAX_TARGET_WEIGHT: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("proxy.targets must contain at least one target")]
    NoTargets,

    #[error("{field}: invalid URL {value:?}")]
    InvalidUrl { field: String, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is required when {when}")]
    Missing { field: &'static str, when: &'static str },

    #[error("{field} must be at most {max}, got {value}")]
    TooLarge { field: &'static str, max: u64, value: u64 },

    #[error("httpd.port and httpd.service_port must differ")]
    PortClash,
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.proxy.targets.is_empty() {
        errors.push(ValidationError::NoTargets);
    }
    for (i, target) in config.proxy.targets.iter().enumerate() {
        if !is_http_url(&target.url) {
            errors.push(ValidationError::InvalidUrl {
                field: format!("proxy.targets[{i}].url"),
                value: target.url.clone(),
            });
        }
        if target.weight == 0 {
            errors.push(ValidationError::Zero { field: "proxy.targets[].weight" });
        } else if target.weight > MAX_TARGET_WEIGHT {
            errors.push(ValidationError::TooLarge {
                field: "proxy.targets[].weight",
                max: u64::from(MAX_TARGET_WEIGHT),
                value: u64::from(target.weight),
            });
        }
    }
    if !is_http_url(&config.proxy.health_url) {
        errors.push(ValidationError::InvalidUrl {
            field: "proxy.health_url".to_string(),
            value: config.proxy.health_url.clone(),
        });
    }

    let ranges: [(&'static str, u64); 6] = [
        ("proxy.timeout_secs", config.proxy.timeout_secs),
        ("session.timeout_ms", config.session.timeout_ms),
        ("permissions.timeout_ms", config.permissions.timeout_ms),
        ("repository.timeout_secs", config.repository.timeout_secs),
        ("health.interval_secs", config.health.interval_secs),
        ("health.timeout_secs", config.health.timeout_secs),
    ];
    for (field, value) in ranges {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.session.source == SessionSource::Kratos && !is_http_url(&config.session.url) {
        errors.push(ValidationError::Missing { field: "session.url", when: "session.source = \"kratos\"" });
    }
    if config.permissions.source == PermissionSource::Keto && !is_http_url(&config.permissions.url) {
        errors.push(ValidationError::Missing { field: "permissions.url", when: "permissions.source = \"keto\"" });
    }
    if config.repository.kind == RepositoryKind::Tcp && config.repository.dsn.is_empty() {
        errors.push(ValidationError::Missing { field: "repository.dsn", when: "repository.kind = \"tcp\"" });
    }
    if config.consul.enabled && config.consul.service_id.is_empty() {
        errors.push(ValidationError::Missing { field: "consul.service_id", when: "consul.enabled = true" });
    }

    if config.httpd.port != 0 && config.httpd.port == config.httpd.service_port {
        errors.push(ValidationError::PortClash);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}
