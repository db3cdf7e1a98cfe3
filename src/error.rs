//! Proxy error kinds and their client-facing mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors raised while handling one inbound request.
///
/// Only `InvalidHost`, `BodyTooLarge` and the two relay variants ever reach a
/// client. Backend-level errors are absorbed by the failover sequence.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Host header missing or with fewer than three labels.
    #[error("Invalid domain: {0}")]
    InvalidHost(String),

    /// Inbound body exceeded the configured buffer limit.
    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// Connection, TLS or timeout failure talking to a backend.
    #[error("Backend {target} unreachable: {reason}")]
    BackendTransport {
        target: String,
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Backend answered with a failure status.
    #[error("Backend {target} returned {status}")]
    BackendStatus { target: String, status: StatusCode },

    /// Response body could not be decoded with its advertised encoding.
    #[error("Failed to decode {encoding} body: {source}")]
    Decode {
        encoding: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// WebSocket dial to the secondary backend failed.
    #[error("WebSocket dial to {target} failed: {reason}")]
    RelayDial { target: String, reason: String },

    /// Client side of the WebSocket upgrade could not be completed.
    #[error("WebSocket upgrade failed: {0}")]
    RelayUpgrade(String),
}

impl ProxyError {
    /// Status code reported to the client for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidHost(_) => StatusCode::BAD_REQUEST,
            ProxyError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::RelayDial { .. } | ProxyError::RelayUpgrade(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::BackendTransport { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::BackendStatus { status, .. } => *status,
            ProxyError::Decode { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ProxyError::InvalidHost(_) => "Invalid domain".to_string(),
            ProxyError::RelayDial { .. } | ProxyError::RelayUpgrade(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}

/// Result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;
