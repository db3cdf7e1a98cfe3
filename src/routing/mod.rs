//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header)
//!     → host.rs (split authority into routing key + original suffix)
//!     → target.rs (routing key + suffix + upstream domain)
//!     → Return: primary and secondary BackendTarget
//! ```
//!
//! # Design Decisions
//! - Routing is determined entirely by the Host header, never the path
//! - Upstream naming is fixed at startup
//! - Deterministic: same host always yields the same targets

pub mod host;
pub mod target;

pub use host::{HostKey, HostResolver, RoutingPolicy};
pub use target::{BackendTarget, Role, TargetNamer};
