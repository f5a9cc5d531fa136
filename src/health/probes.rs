//! Dependency probes.
//!
//! # Responsibilities
//! - `RepositoryProbe`: the persistence health-check contract
//! - `HttpProbe`: `GET {base}{path}` on the upstream through the shared client
//!
//! Timeouts are applied by the aggregator around every probe.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use thiserror::Error;

use crate::repository::{RepositoryError, UserRepository};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered {status}: {body}")]
    BadStatus { url: String, status: StatusCode, body: String },

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// One monitored dependency.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Metric destination label.
    fn destination(&self) -> String;

    async fn check(&self) -> Result<(), ProbeError>;
}

pub struct RepositoryProbe {
    repository: Arc<dyn UserRepository>,
}

impl RepositoryProbe {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Probe for RepositoryProbe {
    fn destination(&self) -> String {
        self.repository.destination()
    }

    async fn check(&self) -> Result<(), ProbeError> {
        self.repository.health_check().await?;
        Ok(())
    }
}

pub struct HttpProbe {
    client: reqwest::Client,
    base_url: String,
    url: String,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client, base_url: &str, path: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let url = format!("{base_url}{path}");
        Self { client, base_url, url }
    }
}

// Keep error bodies in logs short.
const BODY_PREVIEW: usize = 256;

#[async_trait]
impl Probe for HttpProbe {
    fn destination(&self) -> String {
        self.base_url.clone()
    }

    async fn check(&self) -> Result<(), ProbeError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::USER_AGENT, "wda-gateway-health-check")
            .send()
            .await
            .map_err(|source| ProbeError::Request {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > BODY_PREVIEW {
                let mut cut = BODY_PREVIEW;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(ProbeError::BadStatus {
                url: self.url.clone(),
                status,
                body,
            });
        }
        Ok(())
    }
}
