//! End-to-end tests: real listeners, mock upstreams, the gateway in between.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, COOKIE};
use serde_json::Value;

use wda_gateway::config::{RepositoryKind, TargetConfig};

mod common;

use common::{GOOD_TOKEN, GOOD_USER};

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[tokio::test]
async fn test_valid_token_relays_upstream_response() {
    let upstream = common::start_upstream("a").await;
    let gateway = common::spawn_gateway(common::gateway_config(&[&upstream])).await;
    let client = common::client();

    let response = client
        .post(gateway.traffic_url("/v2/layouts/7?view=full"))
        .header(AUTHORIZATION, bearer(GOOD_TOKEN))
        .header("x-request-id", "req-123")
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-upstream"], "a");
    assert_eq!(response.headers()["x-request-id"], "req-123");

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["method"], "POST");
    assert_eq!(body["path"], "/v2/layouts/7");
    assert_eq!(body["query"], "view=full");
    assert_eq!(body["body"], "payload");
    assert_eq!(body["request_id"], "req-123");
    assert_eq!(body["user_id"], GOOD_USER);
    assert_eq!(upstream.hits(), 1);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_request_id_generated_when_missing() {
    let upstream = common::start_upstream("a").await;
    let gateway = common::spawn_gateway(common::gateway_config(&[&upstream])).await;

    let response = common::client()
        .get(gateway.traffic_url("/v2/layouts"))
        .header(AUTHORIZATION, bearer(GOOD_TOKEN))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let echoed = response.headers()["x-request-id"].to_str().unwrap().to_string();
    let body: Value = response.json().await.unwrap();
    assert!(uuid::Uuid::parse_str(&echoed).is_ok(), "{echoed}");
    assert_eq!(body["request_id"], echoed.as_str());

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_invalid_token_rejected_without_upstream_call() {
    let upstream = common::start_upstream("a").await;
    let gateway = common::spawn_gateway(common::gateway_config(&[&upstream])).await;

    let response = common::client()
        .get(gateway.traffic_url("/v2/layouts"))
        .header(AUTHORIZATION, bearer("forged"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
    assert!(body["message"].is_string());
    assert_eq!(upstream.hits(), 0);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_missing_credentials_rejected() {
    let upstream = common::start_upstream("a").await;
    let gateway = common::spawn_gateway(common::gateway_config(&[&upstream])).await;

    let response = common::client().get(gateway.traffic_url("/v2")).send().await.unwrap();

    assert_eq!(response.status(), 401);
    assert_eq!(upstream.hits(), 0);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_cookie_session_and_header_precedence() {
    let upstream = common::start_upstream("a").await;
    let gateway = common::spawn_gateway(common::gateway_config(&[&upstream])).await;
    let client = common::client();

    let response = client
        .get(gateway.traffic_url("/v2/layouts"))
        .header(COOKIE, format!("ory_kratos_session={GOOD_TOKEN}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // A bad header wins over a good cookie.
    let response = client
        .get(gateway.traffic_url("/v2/layouts"))
        .header(AUTHORIZATION, bearer("forged"))
        .header(COOKIE, format!("ory_kratos_session={GOOD_TOKEN}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(upstream.hits(), 1);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_client_user_id_replaced() {
    let upstream = common::start_upstream("a").await;
    let gateway = common::spawn_gateway(common::gateway_config(&[&upstream])).await;

    let response = common::client()
        .get(gateway.traffic_url("/v2/layouts"))
        .header(AUTHORIZATION, bearer(GOOD_TOKEN))
        .header("x-user-id", "admin")
        .send()
        .await
        .unwrap();

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user_id"], GOOD_USER);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_denied_without_grant() {
    let upstream = common::start_upstream("a").await;
    let mut config = common::gateway_config(&[&upstream]);
    config.permissions.rules.clear();
    let gateway = common::spawn_gateway(config).await;

    let response = common::client()
        .get(gateway.traffic_url("/v2/layouts"))
        .header(AUTHORIZATION, bearer(GOOD_TOKEN))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");
    assert_eq!(upstream.hits(), 0);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_round_robin_across_upstreams() {
    let a = common::start_upstream("a").await;
    let b = common::start_upstream("b").await;
    let gateway = common::spawn_gateway(common::gateway_config(&[&a, &b])).await;
    let client = common::client();

    let mut order = Vec::new();
    for _ in 0..6 {
        let response = client
            .get(gateway.traffic_url("/v2/layouts"))
            .header(AUTHORIZATION, bearer(GOOD_TOKEN))
            .send()
            .await
            .unwrap();
        order.push(response.headers()["x-upstream"].to_str().unwrap().to_string());
    }

    assert_eq!(a.hits(), 3);
    assert_eq!(b.hits(), 3);
    assert!(order.windows(2).all(|w| w[0] != w[1]), "{order:?}");

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let upstream = common::start_upstream("a").await;
    let dead = common::closed_port().await;
    let mut config = common::gateway_config(&[&upstream]);
    config.proxy.targets = vec![TargetConfig {
        url: format!("http://{dead}"),
        weight: 1,
    }];
    let gateway = common::spawn_gateway(config).await;

    let response = common::client()
        .get(gateway.traffic_url("/v2/layouts"))
        .header(AUTHORIZATION, bearer(GOOD_TOKEN))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "bad_gateway");

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_upstream_error_status_relayed_verbatim() {
    let upstream = common::start_upstream("a").await;
    let gateway = common::spawn_gateway(common::gateway_config(&[&upstream])).await;

    let response = common::client()
        .get(gateway.traffic_url(common::MISSING_PATH))
        .header(AUTHORIZATION, bearer(GOOD_TOKEN))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(response.headers()["x-upstream"], "a");
    assert_eq!(response.text().await.unwrap(), "nope-body");
    assert_eq!(upstream.hits(), 1);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_upstream_timeout_is_gateway_timeout() {
    let upstream = common::start_upstream("a").await;
    let mut config = common::gateway_config(&[&upstream]);
    config.proxy.timeout_secs = 1;
    let gateway = common::spawn_gateway(config).await;

    let response = common::client()
        .get(gateway.traffic_url(common::SLOW_PATH))
        .header(AUTHORIZATION, bearer(GOOD_TOKEN))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 504);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "gateway_timeout");

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_silent_discovery_agent_does_not_delay_serving() {
    let upstream = common::start_upstream("a").await;
    let agent = common::silent_agent().await;
    let mut config = common::gateway_config(&[&upstream]);
    config.proxy.timeout_secs = 3;
    config.consul.enabled = true;
    config.consul.url = agent.to_string();
    let gateway = common::spawn_gateway(config).await;

    let started = Instant::now();
    let response = common::client()
        .get(gateway.traffic_url("/v1/layout/settings"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());

    let health = common::client().get(gateway.ops_url("/health")).send().await.unwrap();
    assert!(health.status() == 200 || health.status() == 503);
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_layout_settings() {
    let upstream = common::start_upstream("a").await;
    let mut config = common::gateway_config(&[&upstream]);
    config.layout.proxy = "http://layout.local".to_string();
    config.layout.visible.report = "false".to_string();
    let gateway = common::spawn_gateway(config).await;

    let response = common::client()
        .get(gateway.traffic_url("/v1/layout/settings"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: HashMap<String, String> = response.json().await.unwrap();
    assert_eq!(body["proxy"], "http://layout.local");
    assert_eq!(body["online_visible"], "true");
    assert_eq!(body["queue_visible"], "true");
    assert_eq!(body["report_visible"], "false");
    assert_eq!(body["monitoring_visible"], "true");
    assert_eq!(upstream.hits(), 0);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_health_up_when_all_dependencies_up() {
    let upstream = common::start_upstream("a").await;
    let gateway = common::spawn_gateway(common::gateway_config(&[&upstream])).await;

    let (status, body) = common::wait_for_health(&gateway, Duration::from_secs(5), common::all_polled).await;

    assert_eq!(status, 200, "{body}");
    assert_eq!(body["status"], "up");
    assert_eq!(body["version"], "test");

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_persistence_down_degrades_health_only() {
    let upstream = common::start_upstream("a").await;
    let dead = common::closed_port().await;
    let mut config = common::gateway_config(&[&upstream]);
    config.repository.kind = RepositoryKind::Tcp;
    config.repository.dsn = format!("sqlserver://127.0.0.1:{}/countmax", dead.port());
    config.repository.timeout_secs = 1;
    let gateway = common::spawn_gateway(config).await;

    let (status, body) = common::wait_for_health(&gateway, Duration::from_secs(5), common::all_polled).await;
    assert_eq!(status, 503, "{body}");
    assert_eq!(body["status"], "down");

    let deps = body["dependencies"].as_array().unwrap();
    let scope = |name: &str| deps.iter().find(|d| d["scope"] == name).cloned().unwrap();
    assert_eq!(scope("countmax523")["state"], "down");
    assert!(scope("countmax523")["last_error"].is_string());
    assert_eq!(scope("layoutconfig.api")["state"], "up");

    let client = common::client();
    let metrics = client
        .get(gateway.ops_url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let destination = format!("destination=\"127.0.0.1:{}/countmax\"", dead.port());
    let gauge = metrics
        .lines()
        .find(|l| l.starts_with("service_up{") && l.contains(&destination))
        .unwrap_or_else(|| panic!("no gauge for {destination} in\n{metrics}"));
    assert!(gauge.contains("scope=\"countmax523\""));
    assert!(gauge.ends_with(" 0"), "{gauge}");

    // Proxied traffic does not depend on the health snapshot.
    let response = client
        .get(gateway.traffic_url("/v2/layouts"))
        .header(AUTHORIZATION, bearer(GOOD_TOKEN))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_request_duration_recorded() {
    let upstream = common::start_upstream("a").await;
    let gateway = common::spawn_gateway(common::gateway_config(&[&upstream])).await;
    let client = common::client();

    client
        .get(gateway.traffic_url("/v2/layouts"))
        .header(AUTHORIZATION, bearer(GOOD_TOKEN))
        .send()
        .await
        .unwrap();

    let metrics = client
        .get(gateway.ops_url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(
        metrics
            .lines()
            .any(|l| l.starts_with("api_request_duration_seconds_count{") && l.contains("url=\"/v2/{*path}\"")),
        "{metrics}"
    );

    gateway.stop().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_both_listeners() {
    let upstream = common::start_upstream("a").await;
    let gateway = common::spawn_gateway(common::gateway_config(&[&upstream])).await;
    let traffic = gateway.traffic;
    let ops = gateway.ops;

    gateway.stop().await.unwrap();

    assert!(tokio::net::TcpStream::connect(traffic).await.is_err());
    assert!(tokio::net::TcpStream::connect(ops).await.is_err());
}
