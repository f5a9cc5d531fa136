//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Bind listeners → Build backends → Register → Start aggregator and servers
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Drain (grace period) → Abort rest → Deregister
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One cancellation signal drives the aggregator and both listeners
//! - Shutdown has a timeout: remaining tasks are aborted after the grace period

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{Gateway, LifecycleError, StartupError};
