//! Permission evaluation backends.
//!
//! # Variants
//! - `StaticPermissions`: rule list from configuration (no rules → deny all)
//! - `RemotePermissions`: policy service relation-tuple check

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::auth::{service_url, Identity, PermissionDecision, Resource};
use crate::config::{PermissionRule, PermissionsConfig};

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("policy service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("policy service answered {0}")]
    UnexpectedStatus(StatusCode),

    #[error("invalid policy service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Decides whether an identity may access a resource.
#[async_trait]
pub trait PermissionEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        identity: &Identity,
        resource: &Resource,
    ) -> Result<PermissionDecision, PermissionError>;
}

#[derive(Debug, Default)]
pub struct StaticPermissions {
    rules: Vec<PermissionRule>,
}

impl StaticPermissions {
    pub fn new(rules: Vec<PermissionRule>) -> Self {
        Self { rules }
    }

    fn matches(rule: &PermissionRule, identity: &Identity, resource: &Resource) -> bool {
        (rule.subject == "*" || rule.subject == identity.id())
            && covers(&rule.path_prefix, &resource.path)
            && (rule.methods.is_empty()
                || rule
                    .methods
                    .iter()
                    .any(|m| m.eq_ignore_ascii_case(resource.method.as_str())))
    }
}

/// Prefix match on whole path segments: `/v2/layouts` covers `/v2/layouts`
/// and `/v2/layouts/7`, not `/v2/layouts-admin`.
fn covers(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

#[async_trait]
impl PermissionEvaluator for StaticPermissions {
    async fn evaluate(
        &self,
        identity: &Identity,
        resource: &Resource,
    ) -> Result<PermissionDecision, PermissionError> {
        let decision = match self.rules.iter().find(|r| Self::matches(r, identity, resource)) {
            Some(rule) => PermissionDecision::allow(format!("granted by rule for {}", rule.path_prefix)),
            None => PermissionDecision::deny("no matching rule"),
        };
        Ok(decision)
    }
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    allowed: bool,
}

/// Client for a remote relation-tuple policy service.
#[derive(Debug, Clone)]
pub struct RemotePermissions {
    client: reqwest::Client,
    check: Url,
    namespace: String,
    read_relation: String,
    write_relation: String,
    timeout: Duration,
}

impl RemotePermissions {
    pub fn new(client: reqwest::Client, config: &PermissionsConfig) -> Result<Self, PermissionError> {
        let check = service_url(&config.url, "relation-tuples/check")?;
        Ok(Self {
            client,
            check,
            namespace: config.namespace.clone(),
            read_relation: config.read_relation.clone(),
            write_relation: config.write_relation.clone(),
            timeout: config.timeout(),
        })
    }

    fn relation_for(&self, method: &Method) -> &str {
        if method.is_safe() {
            &self.read_relation
        } else {
            &self.write_relation
        }
    }
}

#[async_trait]
impl PermissionEvaluator for RemotePermissions {
    async fn evaluate(
        &self,
        identity: &Identity,
        resource: &Resource,
    ) -> Result<PermissionDecision, PermissionError> {
        let relation = self.relation_for(&resource.method);
        let response = self
            .client
            .get(self.check.clone())
            .timeout(self.timeout)
            .query(&[
                ("namespace", self.namespace.as_str()),
                ("object", resource.path.as_str()),
                ("relation", relation),
                ("subject_id", identity.id()),
            ])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::FORBIDDEN => {
                let body: CheckResponse = response.json().await?;
                Ok(if body.allowed {
                    PermissionDecision::allow(format!("{relation} on {}", resource.path))
                } else {
                    PermissionDecision::deny(format!("no {relation} on {}", resource.path))
                })
            }
            other => Err(PermissionError::UnexpectedStatus(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(subject: &str, prefix: &str, methods: &[&str]) -> PermissionRule {
        PermissionRule {
            subject: subject.into(),
            path_prefix: prefix.into(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn resource(method: Method, path: &str) -> Resource {
        Resource { method, path: path.into() }
    }

    #[tokio::test]
    async fn test_no_rules_denies() {
        let perms = StaticPermissions::default();
        let decision = perms
            .evaluate(&Identity::new("u1", Default::default()), &resource(Method::GET, "/v2/layouts"))
            .await
            .unwrap();
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_rule_matching() {
        let perms = StaticPermissions::new(vec![
            rule("u1", "/v2/layouts", &["get"]),
            rule("*", "/v2/public", &[]),
        ]);
        let u1 = Identity::new("u1", Default::default());
        let u2 = Identity::new("u2", Default::default());

        async fn allowed(perms: &StaticPermissions, who: &Identity, method: Method, path: &str) -> bool {
            perms.evaluate(who, &resource(method, path)).await.unwrap().allowed
        }

        assert!(allowed(&perms, &u1, Method::GET, "/v2/layouts/7").await);
        assert!(!allowed(&perms, &u1, Method::POST, "/v2/layouts/7").await);
        assert!(!allowed(&perms, &u2, Method::GET, "/v2/layouts/7").await);
        assert!(allowed(&perms, &u2, Method::DELETE, "/v2/public/x").await);
    }

    #[tokio::test]
    async fn test_prefix_stops_at_segment_boundary() {
        let perms = StaticPermissions::new(vec![rule("*", "/v2/layouts", &[]), rule("*", "/v1/", &[])]);
        let who = Identity::new("u1", Default::default());

        for (path, expected) in [
            ("/v2/layouts", true),
            ("/v2/layouts/7", true),
            ("/v2/layouts-admin", false),
            ("/v2/layoutsx/1", false),
            ("/v1/anything", true),
        ] {
            let decision = perms.evaluate(&who, &resource(Method::GET, path)).await.unwrap();
            assert_eq!(decision.allowed, expected, "{path}");
        }
    }

    #[test]
    fn test_relation_by_method() {
        let remote = RemotePermissions::new(
            reqwest::Client::new(),
            &PermissionsConfig {
                url: "http://keto:4466".into(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(remote.check.as_str(), "http://keto:4466/relation-tuples/check");
        assert_eq!(remote.relation_for(&Method::GET), "read");
        assert_eq!(remote.relation_for(&Method::PUT), "write");
    }
}
