//! Per-request authentication and authorization decision.
//!
//! # States
//! ```text
//! Start → TokenExtracted → IdentityResolved → Authorized → Forward
//!   │           │                  │
//!   └─ 401      └─ 401             └─ 403
//! ```
//!
//! Stages run strictly in order; a rejection at any edge ends the request.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use thiserror::Error;
use tokio::time;

use crate::auth::{Identity, PermissionEvaluator, Resource, SessionValidator};
use crate::security::{TokenExtractor, TokenSource};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthRejection {
    #[error("no session token")]
    MissingToken,

    #[error("session is not valid")]
    InvalidSession,

    #[error("session validation failed: {0}")]
    ValidatorFailed(String),

    #[error("access denied: {0}")]
    Denied(String),

    #[error("permission check failed: {0}")]
    EvaluatorFailed(String),
}

impl AuthRejection {
    /// Authentication failures (401) as opposed to authorization failures (403).
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthRejection::MissingToken | AuthRejection::InvalidSession | AuthRejection::ValidatorFailed(_)
        )
    }
}

#[derive(Clone)]
pub struct AuthGate {
    extractor: TokenExtractor,
    sessions: Arc<dyn SessionValidator>,
    permissions: Arc<dyn PermissionEvaluator>,
    session_timeout: Duration,
    permission_timeout: Duration,
}

impl AuthGate {
    pub fn new(
        extractor: TokenExtractor,
        sessions: Arc<dyn SessionValidator>,
        permissions: Arc<dyn PermissionEvaluator>,
        session_timeout: Duration,
        permission_timeout: Duration,
    ) -> Self {
        Self {
            extractor,
            sessions,
            permissions,
            session_timeout,
            permission_timeout,
        }
    }

    /// Run the pipeline. `Ok` carries the identity to forward with the request.
    pub async fn authorize(&self, headers: &HeaderMap, resource: &Resource) -> Result<Identity, AuthRejection> {
        let token = self.extractor.extract(headers).ok_or(AuthRejection::MissingToken)?;
        let source = match token.source() {
            TokenSource::HeaderBearer => "header",
            TokenSource::Cookie => "cookie",
        };

        let identity = match time::timeout(self.session_timeout, self.sessions.validate(&token)).await {
            Ok(Ok(Some(identity))) => identity,
            Ok(Ok(None)) => {
                tracing::debug!(source, "Session rejected by validator");
                return Err(AuthRejection::InvalidSession);
            }
            Ok(Err(e)) => {
                tracing::warn!(source, error = %e, "Session validator error");
                return Err(AuthRejection::ValidatorFailed(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(source, timeout = ?self.session_timeout, "Session validator timed out");
                return Err(AuthRejection::ValidatorFailed("timeout".to_string()));
            }
        };

        let evaluation = self.permissions.evaluate(&identity, resource);
        match time::timeout(self.permission_timeout, evaluation).await {
            Ok(Ok(decision)) if decision.allowed => {
                tracing::debug!(identity = %identity.id(), reason = %decision.reason, "Access granted");
                Ok(identity)
            }
            Ok(Ok(decision)) => {
                tracing::info!(
                    identity = %identity.id(),
                    method = %resource.method,
                    path = %resource.path,
                    reason = %decision.reason,
                    "Access denied"
                );
                Err(AuthRejection::Denied(decision.reason))
            }
            Ok(Err(e)) => {
                tracing::warn!(identity = %identity.id(), error = %e, "Permission evaluator error");
                Err(AuthRejection::EvaluatorFailed(e.to_string()))
            }
            Err(_) => {
                tracing::warn!(identity = %identity.id(), timeout = ?self.permission_timeout, "Permission evaluator timed out");
                Err(AuthRejection::EvaluatorFailed("timeout".to_string()))
            }
        }
    }
}
