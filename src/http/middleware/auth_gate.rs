//! Authentication middleware for the proxied API.
//! Rejected requests never reach the dispatcher.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::Resource;
use crate::http::response::ApiError;
use crate::http::server::AppState;

pub async fn auth_gate_middleware(State(state): State<AppState>, mut req: Request<Body>, next: Next) -> Response {
    let resource = Resource {
        method: req.method().clone(),
        path: req.uri().path().to_string(),
    };

    match state.auth.authorize(req.headers(), &resource).await {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(rejection) => ApiError::from(rejection).into_response(),
    }
}
