//! Upstream target pool.
//!
//! # Responsibilities
//! - Hold the configured targets (immutable for the process lifetime)
//! - Apply the load balancing algorithm to pick one per request

use std::sync::Arc;

use crate::config::TargetConfig;
use crate::load_balancer::{
    round_robin::RoundRobin,
    target::{ProxyTarget, TargetError},
    LoadBalancer,
};

#[derive(Debug)]
pub struct TargetPool {
    targets: Vec<Arc<ProxyTarget>>,
    balancer: Box<dyn LoadBalancer>,
}

impl TargetPool {
    /// Round-robin pool over the given targets.
    pub fn new(targets: Vec<ProxyTarget>) -> Self {
        let weights: Vec<u32> = targets.iter().map(ProxyTarget::weight).collect();
        Self {
            targets: targets.into_iter().map(Arc::new).collect(),
            balancer: Box::new(RoundRobin::new(&weights)),
        }
    }

    pub fn from_config(configs: &[TargetConfig]) -> Result<Self, TargetError> {
        let targets = configs
            .iter()
            .map(ProxyTarget::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(targets))
    }

    /// Select the target for the next request.
    pub fn next(&self) -> Option<Arc<ProxyTarget>> {
        let picked = self.balancer.next_target(&self.targets);
        if picked.is_none() {
            tracing::debug!(target_count = self.targets.len(), "No proxy target available");
        }
        picked
    }

    pub fn targets(&self) -> &[Arc<ProxyTarget>] {
        &self.targets
    }
}
