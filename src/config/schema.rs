//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

/// Root configuration for the failover proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Upstream naming: domain, suffixes and schemes.
    pub upstream: UpstreamConfig,

    /// Behavioral switches for routing and response handling.
    pub policy: PolicyConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum inbound body size in bytes. The body is buffered so it can be
    /// replayed against the secondary target.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Upstream naming configuration.
///
/// A request for `shop.example.com` is forwarded to
/// `{http_scheme}://shop{primary_suffix}.{domain}` and, on failure, to
/// `{http_scheme}://shop{secondary_suffix}.{domain}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Domain both backend deployments live under.
    pub domain: String,

    /// Suffix appended to the routing key for the primary deployment.
    pub primary_suffix: String,

    /// Suffix appended to the routing key for the secondary deployment.
    pub secondary_suffix: String,

    /// Scheme for buffered HTTP attempts ("https" or "http").
    pub http_scheme: String,

    /// Scheme for the WebSocket relay dial ("wss" or "ws").
    pub ws_scheme: String,

    /// Static DNS overrides, hostname to socket address. An overridden
    /// target is addressed on the override's port.
    #[serde(default)]
    pub resolve: HashMap<String, SocketAddr>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            domain: "lunaroasis.net".to_string(),
            primary_suffix: "-statescale".to_string(),
            secondary_suffix: "-snapscale".to_string(),
            http_scheme: "https".to_string(),
            ws_scheme: "wss".to_string(),
            resolve: HashMap::new(),
        }
    }
}

/// Policy switches.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Treat every label except the final two as part of the routing key
    /// (`a.b.example.com` routes as `a-b`).
    pub composite_subdomains: bool,

    /// Re-encode a secondary response with its own `Content-Encoding`
    /// instead of the encoding observed on the primary attempt.
    pub strict_encoding_parity: bool,

    /// Collapse repeated response headers to their last value.
    pub flatten_headers: bool,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Per-attempt upstream timeout in seconds.
    pub request_secs: u64,

    /// Upper bound on closing both relay connections once a session ends.
    pub relay_close_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            relay_close_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
