//! Authentication and authorization subsystem.
//!
//! # Data Flow
//! ```text
//! request headers
//!     → security::token (SessionToken or absent)          absent   → 401
//!     → session.rs  SessionValidator::validate            no/error → 401
//!     → permission.rs PermissionEvaluator::evaluate       no/error → 403
//!     → gate.rs returns the Identity to the caller
//! ```
//!
//! # Design Decisions
//! - Fail closed: errors and timeouts are rejections, never pass-through
//! - Backends are trait objects picked once at startup from configuration
//! - Nothing is cached; every request is validated and authorized again

pub mod gate;
pub mod permission;
pub mod session;

use axum::http::Method;
use serde::Serialize;

pub use gate::{AuthGate, AuthRejection};
pub use permission::{PermissionError, PermissionEvaluator, RemotePermissions, StaticPermissions};
pub use session::{InMemorySessions, RemoteSessions, SessionError, SessionValidator};

/// `path` resolved under `base`, keeping any path prefix `base` carries.
pub(crate) fn service_url(base: &str, path: &str) -> Result<url::Url, url::ParseError> {
    let mut base = url::Url::parse(base)?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path)
}

/// Authenticated principal, scoped to one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    id: String,
    attributes: serde_json::Map<String, serde_json::Value>,
}

impl Identity {
    pub fn new(id: impl Into<String>, attributes: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.attributes
    }
}

/// What a request asks to touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub method: Method,
    pub path: String,
}

/// Outcome of a permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDecision {
    pub allowed: bool,
    pub reason: String,
}

impl PermissionDecision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}
