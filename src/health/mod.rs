//! Health aggregation subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (aggregator.rs):
//!     → Probe every dependency concurrently (probes.rs)
//!     → Build one snapshot (state.rs)
//!     → Swap it into the board, set service_up gauges
//!
//! Readers:
//!     → /health on the operational listener
//! ```
//!
//! # Design Decisions
//! - No thresholds: the latest poll decides a dependency's state
//! - Dependencies start Down until their first poll completes
//! - A probe that hangs counts as Down once the probe timeout elapses

pub mod aggregator;
pub mod probes;
pub mod state;

pub use aggregator::HealthAggregator;
pub use probes::{HttpProbe, Probe, ProbeError, RepositoryProbe};
pub use state::{DependencyHealth, HealthBoard, HealthSnapshot, HealthState};
