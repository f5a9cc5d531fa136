//! Error responses.
//!
//! # Design Decisions
//! - Every error leaves the gateway as JSON `{error, message}`
//! - Upstream timeouts map to 504, other upstream failures to 502
//! - Server-side details stay in the log, not in the body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthRejection;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("no upstream target configured")]
    NoTarget,

    #[error("upstream {target} unreachable: {reason}")]
    BadGateway { target: String, reason: String },

    #[error("upstream {target} timed out")]
    GatewayTimeout { target: String },

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NoTarget => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            ApiError::GatewayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NoTarget => "no_upstream",
            ApiError::BadGateway { .. } => "bad_gateway",
            ApiError::GatewayTimeout { .. } => "gateway_timeout",
            ApiError::PayloadTooLarge => "payload_too_large",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Unauthenticated(_) => "valid session required".to_string(),
            ApiError::Forbidden(_) => "access to this resource is denied".to_string(),
            ApiError::BadGateway { .. } => "upstream unavailable".to_string(),
            ApiError::GatewayTimeout { .. } => "upstream timed out".to_string(),
            ApiError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<AuthRejection> for ApiError {
    fn from(rejection: AuthRejection) -> Self {
        if rejection.is_unauthenticated() {
            ApiError::Unauthenticated(rejection.to_string())
        } else {
            ApiError::Forbidden(rejection.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = ErrorBody {
            error: self.error_code(),
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
