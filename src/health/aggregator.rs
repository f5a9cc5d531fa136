//! Periodic dependency polling.
//!
//! # Responsibilities
//! - Poll every dependency once per tick, concurrently, each bounded by the
//!   probe timeout
//! - Publish one snapshot per tick to the shared board
//! - Mirror the result to the `service_up` gauges, one per scope plus the
//!   composite under `general`

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures_util::future::join_all;
use tokio::time;

use crate::health::probes::{Probe, ProbeError};
use crate::health::state::{DependencyHealth, HealthBoard, HealthSnapshot};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::{metrics, BuildInfo};

/// Destination label of the composite gauge.
pub const GENERAL_DESTINATION: &str = "localhost";

struct Dependency {
    scope: String,
    destination: String,
    probe: Arc<dyn Probe>,
}

pub struct HealthAggregator {
    dependencies: Vec<Dependency>,
    board: Arc<HealthBoard>,
    interval: Duration,
    timeout: Duration,
    build: BuildInfo,
}

impl HealthAggregator {
    pub fn new(board: Arc<HealthBoard>, interval: Duration, timeout: Duration, build: BuildInfo) -> Self {
        Self {
            dependencies: Vec::new(),
            board,
            interval,
            timeout,
            build,
        }
    }

    pub fn with_dependency(mut self, scope: impl Into<String>, probe: Arc<dyn Probe>) -> Self {
        let destination = probe.destination();
        self.dependencies.push(Dependency {
            scope: scope.into(),
            destination,
            probe,
        });
        self
    }

    /// Snapshot before the first poll: every dependency Down.
    pub fn initial_snapshot(&self) -> HealthSnapshot {
        HealthSnapshot::new(
            self.dependencies
                .iter()
                .map(|d| DependencyHealth::unknown(&d.scope, &d.destination))
                .collect(),
        )
    }

    /// Publish the all-Down snapshot and zero every gauge.
    pub fn publish_initial(&self) {
        let snapshot = self.board.publish(self.initial_snapshot());
        for dep in &snapshot.dependencies {
            metrics::set_service_up(&dep.scope, &dep.destination, &self.build, false);
        }
        metrics::set_service_up(metrics::GENERAL_SCOPE, GENERAL_DESTINATION, &self.build, false);
    }

    pub fn board(&self) -> &Arc<HealthBoard> {
        &self.board
    }

    /// Run one tick.
    pub async fn poll_once(&self) -> Arc<HealthSnapshot> {
        let timeout = self.timeout;
        let results = join_all(self.dependencies.iter().map(|dep| async move {
            match time::timeout(timeout, dep.probe.check()).await {
                Ok(result) => result,
                Err(_) => Err(ProbeError::Timeout(timeout)),
            }
        }))
        .await;

        let now = SystemTime::now();
        let mut dependencies = Vec::with_capacity(self.dependencies.len());
        for (dep, result) in self.dependencies.iter().zip(results) {
            let result = match result {
                Ok(()) => {
                    tracing::debug!(scope = %dep.scope, destination = %dep.destination, "Dependency up");
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(scope = %dep.scope, destination = %dep.destination, error = %e, "Dependency check failed");
                    Err(e.to_string())
                }
            };
            dependencies.push(DependencyHealth::polled(&dep.scope, &dep.destination, result, now));
        }

        let snapshot = self.board.publish(HealthSnapshot::new(dependencies));

        for dep in &snapshot.dependencies {
            metrics::set_service_up(&dep.scope, &dep.destination, &self.build, dep.state.is_up());
        }
        metrics::set_service_up(metrics::GENERAL_SCOPE, GENERAL_DESTINATION, &self.build, snapshot.is_up());

        snapshot
    }

    /// Poll until shutdown. The first tick fires immediately.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            dependencies = self.dependencies.len(),
            "Health aggregator starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health aggregator received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
