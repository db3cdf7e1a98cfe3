//! Backend target construction.
//!
//! # Responsibilities
//! - Derive the primary and secondary identifiers from a routing key
//! - Build outbound URLs for buffered attempts and the WebSocket dial

use url::Url;

use crate::config::UpstreamConfig;

/// Which of the two deployments a target points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Primary,
    Secondary,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backend deployment for one request. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    pub role: Role,
    /// Routing key plus suffix, e.g. `shop-statescale`.
    pub identifier: String,
    /// Fully-qualified hostname, e.g. `shop-statescale.lunaroasis.net`.
    pub hostname: String,
    /// Scheme used for buffered HTTP attempts.
    pub http_scheme: String,
    /// Scheme used for the WebSocket dial.
    pub ws_scheme: String,
    /// Explicit port, set when a resolve override pins this hostname.
    pub port: Option<u16>,
}

impl BackendTarget {
    /// URL for a buffered attempt carrying the original request URI.
    pub fn http_url(&self, path_and_query: &str) -> Result<Url, url::ParseError> {
        self.join(&self.http_scheme, path_and_query)
    }

    /// URL for the WebSocket dial carrying the original request URI.
    pub fn ws_url(&self, path_and_query: &str) -> Result<Url, url::ParseError> {
        self.join(&self.ws_scheme, path_and_query)
    }

    fn join(&self, scheme: &str, path_and_query: &str) -> Result<Url, url::ParseError> {
        let path = if path_and_query.starts_with('/') {
            path_and_query.to_string()
        } else {
            format!("/{}", path_and_query)
        };
        match self.port {
            Some(port) => Url::parse(&format!("{}://{}:{}{}", scheme, self.hostname, port, path)),
            None => Url::parse(&format!("{}://{}{}", scheme, self.hostname, path)),
        }
    }
}

/// Builds targets from the static upstream naming configuration.
#[derive(Debug, Clone)]
pub struct TargetNamer {
    config: UpstreamConfig,
}

impl TargetNamer {
    pub fn new(config: UpstreamConfig) -> Self {
        Self { config }
    }

    /// Target for the given role and routing key.
    pub fn target(&self, role: Role, routing_key: &str) -> BackendTarget {
        let suffix = match role {
            Role::Primary => &self.config.primary_suffix,
            Role::Secondary => &self.config.secondary_suffix,
        };
        let identifier = format!("{}{}", routing_key, suffix);
        let hostname = format!("{}.{}", identifier, self.config.domain);
        BackendTarget {
            role,
            identifier,
            http_scheme: self.config.http_scheme.clone(),
            ws_scheme: self.config.ws_scheme.clone(),
            port: self.config.resolve.get(&hostname).map(|addr| addr.port()),
            hostname,
        }
    }

    pub fn primary(&self, routing_key: &str) -> BackendTarget {
        self.target(Role::Primary, routing_key)
    }

    pub fn secondary(&self, routing_key: &str) -> BackendTarget {
        self.target(Role::Secondary, routing_key)
    }
}
