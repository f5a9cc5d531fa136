//! Request forwarding to the upstream targets.
//!
//! # Responsibilities
//! - Pick a target from the pool (round robin)
//! - Forward method, path, query, headers and body
//! - Relay the upstream status, headers and body back unchanged
//!
//! # Design Decisions
//! - Hop-by-hop headers are stripped in both directions
//! - The response body is streamed, the request body is buffered up to the
//!   configured limit
//! - No retry against another target; a failed attempt ends the request

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    response::Response,
};

use crate::auth::Identity;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::security::headers::{forward_headers, strip_hop_by_hop};

pub async fn proxy_handler(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    let target = state.targets.next().ok_or(ApiError::NoTarget)?;

    let (parts, body) = request.into_parts();
    let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = target.url_for(path_and_query);
    let client_addr = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0);
    let identity_id = parts.extensions.get::<Identity>().map(|identity| identity.id().to_string());

    let body = axum::body::to_bytes(body, state.body_limit)
        .await
        .map_err(|_| ApiError::PayloadTooLarge)?;
    let headers = forward_headers(parts.headers, client_addr, identity_id.as_deref());

    tracing::debug!(
        method = %parts.method,
        target = %target,
        path = %path_and_query,
        "Forwarding request"
    );

    let upstream = state
        .client
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                tracing::warn!(target = %target, error = %e, "Upstream timed out");
                ApiError::GatewayTimeout {
                    target: target.to_string(),
                }
            } else {
                tracing::warn!(target = %target, error = %e, "Upstream request failed");
                ApiError::BadGateway {
                    target: target.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
