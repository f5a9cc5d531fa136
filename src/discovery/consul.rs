//! Consul agent adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use crate::discovery::{DiscoveryError, ServiceDescriptor, ServiceRegistry};

const CHECK_INTERVAL: &str = "60s";
const DEREGISTER_CRITICAL_AFTER: &str = "90m";
const WEIGHT_PASSING: u32 = 10;
const WEIGHT_WARNING: u32 = 1;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Registration<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    name: &'a str,
    tags: &'a [String],
    address: &'a str,
    port: u16,
    meta: HashMap<&'static str, &'a str>,
    enable_tag_override: bool,
    check: Check,
    weights: Weights,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Check {
    #[serde(rename = "HTTP")]
    http: String,
    interval: &'static str,
    deregister_critical_service_after: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Weights {
    passing: u32,
    warning: u32,
}

impl<'a> Registration<'a> {
    fn new(descriptor: &'a ServiceDescriptor) -> Self {
        Self {
            id: &descriptor.id,
            name: &descriptor.name,
            tags: &descriptor.tags,
            address: &descriptor.address,
            port: descriptor.port,
            meta: HashMap::from([("version", descriptor.version.as_str())]),
            enable_tag_override: false,
            check: Check {
                http: descriptor.health_url(),
                interval: CHECK_INTERVAL,
                deregister_critical_service_after: DEREGISTER_CRITICAL_AFTER,
            },
            weights: Weights {
                passing: WEIGHT_PASSING,
                warning: WEIGHT_WARNING,
            },
        }
    }
}

/// Registers through the local agent's HTTP API.
#[derive(Debug, Clone)]
pub struct ConsulRegistry {
    client: reqwest::Client,
    agent: Url,
}

impl ConsulRegistry {
    /// `address` is `host:port` or a full URL.
    pub fn new(client: reqwest::Client, address: &str) -> Result<Self, DiscoveryError> {
        let raw = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };
        let agent = Url::parse(&raw).map_err(|_| DiscoveryError::InvalidUrl(address.to_string()))?;
        Ok(Self { client, agent })
    }

    fn endpoint(&self, path: &str) -> Result<Url, DiscoveryError> {
        self.agent
            .join(path)
            .map_err(|_| DiscoveryError::InvalidUrl(format!("{}{path}", self.agent)))
    }

    async fn check(response: reqwest::Response) -> Result<(), DiscoveryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DiscoveryError::Rejected { status, body })
    }
}

#[async_trait]
impl ServiceRegistry for ConsulRegistry {
    async fn register(&self, descriptor: &ServiceDescriptor) -> Result<(), DiscoveryError> {
        let url = self.endpoint("/v1/agent/service/register")?;
        let response = self.client.put(url).json(&Registration::new(descriptor)).send().await?;
        Self::check(response).await?;

        tracing::info!(
            service_id = %descriptor.id,
            agent = %self.agent,
            address = %descriptor.address,
            port = descriptor.port,
            "Registered with consul"
        );
        Ok(())
    }

    async fn deregister(&self, service_id: &str) -> Result<(), DiscoveryError> {
        let url = self.endpoint(&format!("/v1/agent/service/deregister/{service_id}"))?;
        let response = self.client.put(url).send().await?;
        Self::check(response).await?;

        tracing::info!(service_id = %service_id, "Deregistered from consul");
        Ok(())
    }
}
