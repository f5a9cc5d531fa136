//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming /v2 request:
//!     → token.rs (find the session token: header first, then cookie)
//!     → [auth gate validates and authorizes]
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-For / X-User-Id)
//!     → Pass to proxy
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input (identity headers are overwritten)

pub mod headers;
pub mod token;

pub use token::{SessionToken, TokenExtractor, TokenSource};
