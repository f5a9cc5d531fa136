//! WDA layout gateway library.
//!
//! An authenticating API gateway: `/v2/*` requests are authenticated and
//! authorized, then forwarded round robin to the layout upstreams, while a
//! background aggregator tracks dependency health for `/health` and `/metrics`.

// Core subsystems
pub mod config;
pub mod http;

// Request path
pub mod auth;
pub mod load_balancer;
pub mod security;

// Dependencies and their health
pub mod discovery;
pub mod health;
pub mod repository;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::GatewayConfig;
pub use lifecycle::{Gateway, Shutdown};
pub use observability::BuildInfo;
