//! Service discovery registration.
//!
//! # Data Flow
//! ```text
//! Boot:     lifecycle → register(descriptor)
//! Shutdown: lifecycle → deregister(service_id)   (last step)
//! ```
//!
//! Failures are logged by the caller and never abort the process.

pub mod consul;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::GatewayConfig;

pub use consul::ConsulRegistry;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid registry address {0:?}")]
    InvalidUrl(String),

    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("registry answered {status}: {body}")]
    Rejected { status: reqwest::StatusCode, body: String },
}

/// What gets announced to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub address: String,
    pub port: u16,
    pub version: String,
}

impl ServiceDescriptor {
    pub fn from_config(config: &GatewayConfig, version: &str) -> Self {
        Self {
            id: config.consul.service_id.clone(),
            name: config.app.name.clone(),
            tags: config.app.tag_list(),
            address: config.consul.address.clone(),
            port: config.consul.port,
            version: version.to_string(),
        }
    }

    /// Health URL the registry polls, on the operational listener.
    pub fn health_url(&self) -> String {
        format!("http://{}:{}/health", self.address, self.port)
    }
}

#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    async fn register(&self, descriptor: &ServiceDescriptor) -> Result<(), DiscoveryError>;

    async fn deregister(&self, service_id: &str) -> Result<(), DiscoveryError>;
}

/// Used when discovery is turned off.
#[derive(Debug, Default)]
pub struct DisabledRegistry;

#[async_trait]
impl ServiceRegistry for DisabledRegistry {
    async fn register(&self, descriptor: &ServiceDescriptor) -> Result<(), DiscoveryError> {
        tracing::debug!(service_id = %descriptor.id, "Discovery disabled, skipping registration");
        Ok(())
    }

    async fn deregister(&self, _service_id: &str) -> Result<(), DiscoveryError> {
        Ok(())
    }
}
