//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Traffic listener
//!     → server.rs (panic guard, request ID, trace, timeout, body limit)
//!     → middleware/auth_gate.rs (401/403 short-circuit)
//!     → proxy.rs (pick target, forward, relay)
//!     → response.rs (JSON error bodies)
//!
//! Operational listener
//!     → ops.rs (/health, /metrics)
//! ```

pub mod middleware;
pub mod ops;
pub mod proxy;
pub mod response;
pub mod server;
pub mod settings;

pub use response::ApiError;
pub use server::{build_client, ops_router, traffic_router, AppState, X_REQUEST_ID};
pub use settings::LayoutSettings;
