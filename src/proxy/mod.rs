//! Failover proxying subsystem.
//!
//! # Data Flow
//! ```text
//! HostKey + buffered InboundRequest
//!     → orchestrator.rs (primary attempt, failure predicate)
//!     → forwarder.rs (one outbound call per attempt)
//!     → orchestrator.rs (optional secondary attempt)
//!     → rewrite (decode → hostname rewrite → re-encode)
//!     → ProxiedResponse
//! ```
//!
//! # Design Decisions
//! - At most two attempts, strictly sequential, no backoff
//! - Backend failures are data (`AttemptResult`), never propagated errors
//! - The forwarder sits behind the `Upstream` trait so the sequence can be
//!   exercised without a network

pub mod forwarder;
pub mod orchestrator;

pub use forwarder::{AttemptResult, Forwarder, InboundRequest, Upstream};
pub use orchestrator::{Orchestrator, ProxiedResponse};
