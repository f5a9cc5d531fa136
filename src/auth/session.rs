//! Session validation backends.
//!
//! # Variants
//! - `InMemorySessions`: static token table from configuration
//! - `RemoteSessions`: identity service `GET /sessions/whoami`
//!
//! Both answer `Ok(Some(identity))`, `Ok(None)` for an unauthenticated token, or an
//! error. Callers treat errors exactly like `Ok(None)`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::auth::{service_url, Identity};
use crate::config::StaticIdentity;
use crate::security::{SessionToken, TokenSource};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("identity service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity service answered {0}")]
    UnexpectedStatus(StatusCode),

    #[error("invalid identity service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Resolves a session token to an identity.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate(&self, token: &SessionToken) -> Result<Option<Identity>, SessionError>;
}

/// Token table loaded at startup.
#[derive(Debug, Default)]
pub struct InMemorySessions {
    sessions: HashMap<String, Identity>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(tokens: &HashMap<String, StaticIdentity>) -> Self {
        let sessions = tokens
            .iter()
            .map(|(token, ident)| {
                let attributes = ident
                    .traits
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect();
                (token.clone(), Identity::new(ident.id.clone(), attributes))
            })
            .collect();
        Self { sessions }
    }

    pub fn insert(&mut self, token: impl Into<String>, identity: Identity) {
        self.sessions.insert(token.into(), identity);
    }
}

#[async_trait]
impl SessionValidator for InMemorySessions {
    async fn validate(&self, token: &SessionToken) -> Result<Option<Identity>, SessionError> {
        Ok(self.sessions.get(token.value()).cloned())
    }
}

#[derive(Debug, Deserialize)]
struct WhoAmI {
    #[serde(default = "default_active")]
    active: bool,
    identity: WhoAmIIdentity,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct WhoAmIIdentity {
    id: String,
    #[serde(default)]
    traits: serde_json::Map<String, serde_json::Value>,
}

/// Client for a remote identity service.
#[derive(Debug, Clone)]
pub struct RemoteSessions {
    client: reqwest::Client,
    whoami: Url,
    cookie_name: String,
    timeout: Duration,
}

impl RemoteSessions {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        cookie_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SessionError> {
        let whoami = service_url(base_url, "sessions/whoami")?;
        Ok(Self {
            client,
            whoami,
            cookie_name: cookie_name.into(),
            timeout,
        })
    }
}

#[async_trait]
impl SessionValidator for RemoteSessions {
    async fn validate(&self, token: &SessionToken) -> Result<Option<Identity>, SessionError> {
        let request = self.client.get(self.whoami.clone()).timeout(self.timeout);
        let request = match token.source() {
            TokenSource::HeaderBearer => request.header("X-Session-Token", token.value()),
            TokenSource::Cookie => request.header(
                reqwest::header::COOKIE,
                format!("{}={}", self.cookie_name, token.value()),
            ),
        };

        let response = request.send().await?;
        match response.status() {
            StatusCode::OK => {
                let session: WhoAmI = response.json().await?;
                if !session.active {
                    return Ok(None);
                }
                Ok(Some(Identity::new(session.identity.id, session.identity.traits)))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            other => Err(SessionError::UnexpectedStatus(other)),
        }
    }
}
