//! Failover Reverse Proxy Library
//!
//! Routes each request by the leftmost host label to a primary backend,
//! falls back to a secondary one, rewrites backend hostnames in response
//! bodies and relays WebSocket sessions to the secondary.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod proxy;
pub mod rewrite;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use error::{ProxyError, ProxyResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
