//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Authorized /v2 request
//!     → pool.rs (configured targets)
//!     → round_robin.rs (smooth weighted rotation)
//!     → target.rs (outbound URL for the request path)
//! ```
//!
//! # Design Decisions
//! - Targets are loaded at startup and never change
//! - Selection is lock-free (one atomic counter)
//! - A failed request is reported, never re-sent to another target

pub mod pool;
pub mod round_robin;
pub mod target;

use std::sync::Arc;

pub use pool::TargetPool;
pub use target::ProxyTarget;

/// Strategy choosing the target for the next request.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    fn next_target(&self, targets: &[Arc<ProxyTarget>]) -> Option<Arc<ProxyTarget>>;
}
