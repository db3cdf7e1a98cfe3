//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing span)
//!     → request.rs (authority, upgrade detection, body buffering)
//!     → [routing resolves the host key]
//!     → websocket.rs (upgrades, relayed to the secondary)
//!       or [proxy orchestrator runs primary → secondary]
//!     → response.rs (copy status and headers, attach rewritten body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
pub use websocket::RelaySettings;
