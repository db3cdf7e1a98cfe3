//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check upstream naming produces two distinct, well-formed hostnames
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for semantic problems.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::new("listener.max_body_size", "must be greater than 0"));
    }

    let upstream = &config.upstream;
    if upstream.domain.is_empty() {
        errors.push(ValidationError::new("upstream.domain", "must not be empty"));
    } else if upstream.domain.starts_with('.') || upstream.domain.ends_with('.') {
        errors.push(ValidationError::new(
            "upstream.domain",
            "must not start or end with '.'",
        ));
    }
    if upstream.primary_suffix == upstream.secondary_suffix {
        errors.push(ValidationError::new(
            "upstream.secondary_suffix",
            "must differ from upstream.primary_suffix",
        ));
    }
    for (field, suffix) in [
        ("upstream.primary_suffix", &upstream.primary_suffix),
        ("upstream.secondary_suffix", &upstream.secondary_suffix),
    ] {
        if suffix.contains('.') || suffix.contains('/') {
            errors.push(ValidationError::new(field, "must not contain '.' or '/'"));
        }
    }
    if !matches!(upstream.http_scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::new(
            "upstream.http_scheme",
            format!("unsupported scheme '{}'", upstream.http_scheme),
        ));
    }
    if !matches!(upstream.ws_scheme.as_str(), "ws" | "wss") {
        errors.push(ValidationError::new(
            "upstream.ws_scheme",
            format!("unsupported scheme '{}'", upstream.ws_scheme),
        ));
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.connect_secs", timeouts.connect_secs),
        ("timeouts.request_secs", timeouts.request_secs),
        ("timeouts.relay_close_secs", timeouts.relay_close_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
