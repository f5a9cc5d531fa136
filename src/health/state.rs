//! Dependency health state.
//!
//! # States
//! - Up: the latest poll of the dependency succeeded
//! - Down: the latest poll failed, timed out, or no poll has completed yet
//!
//! # Composite
//! ```text
//! composite = Up  iff  every dependency = Up
//! ```
//!
//! A snapshot is immutable. The aggregator builds a whole new one per tick and
//! publishes it with one atomic pointer swap, so readers never see a mix of two
//! ticks.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Up,
    Down,
}

impl HealthState {
    pub fn is_up(self) -> bool {
        self == HealthState::Up
    }
}

/// Last known state of one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyHealth {
    pub scope: String,
    pub destination: String,
    pub state: HealthState,
    /// Unix time of the last completed poll, in milliseconds.
    pub checked_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl DependencyHealth {
    /// Not polled yet; counts as Down.
    pub fn unknown(scope: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            destination: destination.into(),
            state: HealthState::Down,
            checked_at_ms: None,
            last_error: None,
        }
    }

    pub fn polled(
        scope: impl Into<String>,
        destination: impl Into<String>,
        result: Result<(), String>,
        at: SystemTime,
    ) -> Self {
        let checked_at_ms = at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .ok();
        let (state, last_error) = match result {
            Ok(()) => (HealthState::Up, None),
            Err(e) => (HealthState::Down, Some(e)),
        };
        Self {
            scope: scope.into(),
            destination: destination.into(),
            state,
            checked_at_ms,
            last_error,
        }
    }
}

/// Composite plus per-dependency state, as of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthState,
    pub dependencies: Vec<DependencyHealth>,
}

impl HealthSnapshot {
    pub fn new(dependencies: Vec<DependencyHealth>) -> Self {
        let all_up = dependencies.iter().all(|d| d.state.is_up());
        Self {
            status: if all_up { HealthState::Up } else { HealthState::Down },
            dependencies,
        }
    }

    pub fn is_up(&self) -> bool {
        self.status.is_up()
    }

    pub fn dependency(&self, scope: &str) -> Option<&DependencyHealth> {
        self.dependencies.iter().find(|d| d.scope == scope)
    }
}

/// Shared, atomically replaced health snapshot.
#[derive(Debug)]
pub struct HealthBoard {
    current: ArcSwap<HealthSnapshot>,
}

impl HealthBoard {
    pub fn new(initial: HealthSnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    pub fn snapshot(&self) -> Arc<HealthSnapshot> {
        self.current.load_full()
    }

    pub(crate) fn publish(&self, snapshot: HealthSnapshot) -> Arc<HealthSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(snapshot.clone());
        snapshot
    }
}
