//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Application identity (name, environment, discovery tags).
    pub app: AppConfig,

    /// Traffic and operational listener addresses.
    pub httpd: HttpdConfig,

    /// Log level and sink.
    pub log: LogConfig,

    /// Upstream targets and the shared outbound client.
    pub proxy: ProxyConfig,

    /// Session validation backend.
    pub session: SessionConfig,

    /// Permission evaluation backend.
    pub permissions: PermissionsConfig,

    /// Persistence backend.
    pub repository: RepositoryConfig,

    /// Dependency polling.
    pub health: HealthConfig,

    /// Service discovery registration.
    pub consul: ConsulConfig,

    /// Static GUI settings.
    pub layout: LayoutConfig,

    /// Graceful shutdown.
    pub shutdown: ShutdownConfig,

    /// Request limits.
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Program name reported in logs and discovery.
    pub name: String,

    /// Deployment environment; "production" switches logs to JSON.
    pub env: String,

    /// Comma separated discovery tags.
    pub tags: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "wda".to_string(),
            env: "development".to_string(),
            tags: String::new(),
        }
    }
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpdConfig {
    /// Bind host shared by both listeners.
    pub host: String,

    /// Traffic listener port (`/v2/*`, `/v1/layout/settings`).
    pub port: u16,

    /// Operational listener port (`/health`, `/metrics`).
    pub service_port: u16,
}

impl Default for HttpdConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            service_port: 9090,
        }
    }
}

impl HttpdConfig {
    pub fn traffic_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn service_address(&self) -> String {
        format!("{}:{}", self.host, self.service_port)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error and their common spellings).
    pub level: String,

    /// "stdout" or a file path.
    pub file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: "stdout".to_string(),
        }
    }
}

/// One upstream candidate.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Base URL, e.g. "http://layout:8080".
    pub url: String,

    /// Share of requests relative to the other targets (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Upstream and outbound client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Upstream targets, balanced round-robin.
    pub targets: Vec<TargetConfig>,

    /// Base URL probed by the health aggregator.
    pub health_url: String,

    /// Path appended to `health_url`.
    pub health_path: String,

    /// Outbound request timeout in seconds; also the idle connection timeout.
    pub timeout_secs: u64,

    /// Upper bound on idle pooled connections per upstream host.
    pub max_idle_conns: usize,

    /// Skip upstream certificate verification.
    pub insecure_skip_verify: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            health_url: String::new(),
            health_path: "/health".to_string(),
            timeout_secs: 30,
            max_idle_conns: 50,
            insecure_skip_verify: false,
        }
    }
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    #[default]
    Memory,
    Kratos,
}

/// Identity attached to an in-memory session token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticIdentity {
    pub id: String,

    #[serde(default)]
    pub traits: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub source: SessionSource,

    /// Identity service base URL (kratos source).
    pub url: String,

    /// Validation call timeout in milliseconds.
    pub timeout_ms: u64,

    /// Cookie carrying the session token when no Authorization header is sent.
    pub cookie_name: String,

    /// Token table for the memory source.
    pub tokens: HashMap<String, StaticIdentity>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source: SessionSource::Memory,
            url: String::new(),
            timeout_ms: 2000,
            cookie_name: "ory_kratos_session".to_string(),
            tokens: HashMap::new(),
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionSource {
    #[default]
    Memory,
    Keto,
}

/// A static grant for the memory permission source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PermissionRule {
    /// Identity id, or "*" for any authenticated identity.
    pub subject: String,

    /// Request path prefix the grant covers.
    pub path_prefix: String,

    /// Allowed methods; empty means any.
    #[serde(default)]
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub source: PermissionSource,

    /// Policy service base URL (keto source).
    pub url: String,

    /// Evaluation call timeout in milliseconds.
    pub timeout_ms: u64,

    /// Relation tuple namespace.
    pub namespace: String,

    /// Relation checked for safe methods (GET, HEAD, OPTIONS).
    pub read_relation: String,

    /// Relation checked for every other method.
    pub write_relation: String,

    /// Grants for the memory source. No rules means everything is denied.
    pub rules: Vec<PermissionRule>,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            source: PermissionSource::Memory,
            url: String::new(),
            timeout_ms: 2000,
            namespace: "layout".to_string(),
            read_relation: "read".to_string(),
            write_relation: "write".to_string(),
            rules: Vec::new(),
        }
    }
}

impl PermissionsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    #[default]
    Memory,
    Tcp,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub kind: RepositoryKind,

    /// Database DSN, e.g. "sqlserver://db.local:1433/countmax" (tcp kind).
    pub dsn: String,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            kind: RepositoryKind::Memory,
            dsn: String::new(),
            timeout_secs: 5,
        }
    }
}

impl RepositoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Dependency polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Poll interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Metric scope of the persistence dependency.
    pub persistence_scope: String,

    /// Metric scope of the upstream dependency.
    pub upstream_scope: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            timeout_secs: 5,
            persistence_scope: "countmax523".to_string(),
            upstream_scope: "layoutconfig.api".to_string(),
        }
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsulConfig {
    pub enabled: bool,

    /// Agent address, e.g. "localhost:8500".
    pub url: String,

    pub service_id: String,

    /// Address advertised to the registry.
    pub address: String,

    /// Port advertised to the registry (the operational listener).
    pub port: u16,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "localhost:8500".to_string(),
            service_id: "wda".to_string(),
            address: "127.0.0.1".to_string(),
            port: 9090,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VisibilityConfig {
    pub online: String,
    pub queue: String,
    pub report: String,
    pub monitoring: String,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            online: "true".to_string(),
            queue: "true".to_string(),
            report: "true".to_string(),
            monitoring: "true".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LayoutConfig {
    pub proxy: String,
    pub visible: VisibilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time allowed for in-flight requests to finish, in seconds.
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 5 }
    }
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
