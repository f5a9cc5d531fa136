//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use wda_gateway::config::{PermissionRule, StaticIdentity, TargetConfig};
use wda_gateway::lifecycle::LifecycleError;
use wda_gateway::{BuildInfo, Gateway, GatewayConfig, Shutdown};

pub const GOOD_TOKEN: &str = "good-token";
pub const GOOD_USER: &str = "user-1";

/// A mock layout API that echoes what it received.
pub struct MockUpstream {
    pub name: &'static str,
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Proxied requests seen so far (health probes excluded).
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct UpstreamState {
    name: &'static str,
    hits: Arc<AtomicUsize>,
}

/// Path on every mock upstream that answers 404 with a plain body.
pub const MISSING_PATH: &str = "/v2/missing";
/// Path on every mock upstream that never answers within a test's patience.
pub const SLOW_PATH: &str = "/v2/slow";

async fn echo(State(state): State<UpstreamState>, request: Request) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    match request.uri().path() {
        MISSING_PATH => {
            return (StatusCode::NOT_FOUND, [("x-upstream", state.name)], "nope-body").into_response();
        }
        SLOW_PATH => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            return StatusCode::OK.into_response();
        }
        _ => {}
    }

    let (parts, body) = request.into_parts();
    let body: Bytes = axum::body::to_bytes(body, 1024 * 1024).await.unwrap_or_default();
    let header = |headers: &HeaderMap, name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    (
        StatusCode::OK,
        [("x-upstream", state.name)],
        Json(json!({
            "upstream": state.name,
            "method": parts.method.as_str(),
            "path": parts.uri.path(),
            "query": parts.uri.query(),
            "request_id": header(&parts.headers, "x-request-id"),
            "user_id": header(&parts.headers, "x-user-id"),
            "body": String::from_utf8_lossy(&body),
        })),
    )
        .into_response()
}

/// Start a mock upstream on an ephemeral port.
pub async fn start_upstream(name: &'static str) -> MockUpstream {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .fallback(echo)
        .with_state(UpstreamState {
            name,
            hits: hits.clone(),
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockUpstream { name, addr, hits }
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A discovery agent that accepts connections and never answers.
pub async fn silent_agent() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    addr
}

/// Gateway configuration over `upstreams`: one static token, one grant on `/v2`.
pub fn gateway_config(upstreams: &[&MockUpstream]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.httpd.host = "127.0.0.1".to_string();
    config.httpd.port = 0;
    config.httpd.service_port = 0;

    config.proxy.targets = upstreams
        .iter()
        .map(|u| TargetConfig { url: u.url(), weight: 1 })
        .collect();
    config.proxy.health_url = upstreams.first().map(|u| u.url()).unwrap_or_default();
    config.proxy.timeout_secs = 5;

    config.session.tokens = HashMap::from([(
        GOOD_TOKEN.to_string(),
        StaticIdentity {
            id: GOOD_USER.to_string(),
            traits: HashMap::new(),
        },
    )]);
    config.permissions.rules = vec![PermissionRule {
        subject: "*".to_string(),
        path_prefix: "/v2".to_string(),
        methods: Vec::new(),
    }];

    config.health.interval_secs = 1;
    config.health.timeout_secs = 1;
    config.shutdown.grace_secs = 2;
    config
}

pub struct RunningGateway {
    pub traffic: SocketAddr,
    pub ops: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), LifecycleError>>,
}

impl RunningGateway {
    pub fn traffic_url(&self, path: &str) -> String {
        format!("http://{}{}", self.traffic, path)
    }

    pub fn ops_url(&self, path: &str) -> String {
        format!("http://{}{}", self.ops, path)
    }

    /// Trigger shutdown and wait for `run` to return.
    pub async fn stop(self) -> Result<(), LifecycleError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("gateway did not stop")
            .expect("gateway task panicked")
    }
}

pub async fn spawn_gateway(config: GatewayConfig) -> RunningGateway {
    let gateway = Gateway::bind(config, BuildInfo::new("test", "deadbeef", "1"))
        .await
        .expect("gateway bind");
    let traffic = gateway.traffic_addr().unwrap();
    let ops = gateway.ops_addr().unwrap();

    let shutdown = Shutdown::new();
    let task = tokio::spawn(gateway.run(shutdown.clone()));

    RunningGateway {
        traffic,
        ops,
        shutdown,
        task,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Poll `/health` until `accept` holds for the body, or give up after `wait`.
pub async fn wait_for_health<F>(gateway: &RunningGateway, wait: Duration, accept: F) -> (u16, serde_json::Value)
where
    F: Fn(&serde_json::Value) -> bool,
{
    let client = client();
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let response = client.get(gateway.ops_url("/health")).send().await.unwrap();
        let status = response.status().as_u16();
        let body: serde_json::Value = response.json().await.unwrap();
        if accept(&body) || tokio::time::Instant::now() >= deadline {
            return (status, body);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// True once every dependency has completed at least one poll.
pub fn all_polled(body: &serde_json::Value) -> bool {
    body["dependencies"]
        .as_array()
        .map(|deps| !deps.is_empty() && deps.iter().all(|d| !d["checked_at_ms"].is_null()))
        .unwrap_or(false)
}
