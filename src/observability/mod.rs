//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (service_up gauges, request duration histogram)
//!
//! Consumers:
//!     → Log aggregation (stdout or file)
//!     → /metrics on the operational listener (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows from the traffic listener to the upstream
//! - Every gauge carries version, githash and build labels

pub mod logging;
pub mod metrics;

/// Identifies the running binary in logs and metric labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    pub githash: String,
    pub build: String,
}

impl BuildInfo {
    pub fn new(version: impl Into<String>, githash: impl Into<String>, build: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            githash: githash.into(),
            build: build.into(),
        }
    }

    /// Values baked in at compile time (`WDA_GITHASH`, `WDA_BUILD`).
    pub fn current() -> Self {
        Self::new(
            env!("CARGO_PKG_VERSION"),
            option_env!("WDA_GITHASH").unwrap_or("unknown"),
            option_env!("WDA_BUILD").unwrap_or("unknown"),
        )
    }
}
