//! Host key resolution.
//!
//! # Responsibilities
//! - Split the inbound authority into a routing key and the original suffix
//! - Reject authorities with fewer than three labels
//!
//! # Design Decisions
//! - One policy per process, chosen from config; never both at once
//! - The authority is kept verbatim (port included) as the rewrite target
//! - Labels are compared and kept case-sensitively

use crate::error::{ProxyError, ProxyResult};

/// Minimum number of labels: `subdomain.secondlevel.tld`.
const MIN_LABELS: usize = 3;

/// Routing information derived from one inbound authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKey {
    /// Key both backend identifiers are built from.
    pub routing_key: String,
    /// Labels that followed the routing key, rejoined with `.`.
    pub original_suffix: String,
    /// Authority exactly as the client sent it.
    pub client_host: String,
}

/// Policy deciding which labels form the routing key.
pub trait RoutingPolicy: Send + Sync + std::fmt::Debug {
    /// Split validated labels into `(routing_key, original_suffix)`.
    fn split(&self, labels: &[&str]) -> (String, String);
}

/// The leftmost label is the routing key.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeftmostLabel;

impl RoutingPolicy for LeftmostLabel {
    fn split(&self, labels: &[&str]) -> (String, String) {
        (labels[0].to_string(), labels[1..].join("."))
    }
}

/// Every label ahead of the registrable domain is part of the routing key,
/// joined with `-` so the backend identifier stays a single label.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositeSubdomain;

impl RoutingPolicy for CompositeSubdomain {
    fn split(&self, labels: &[&str]) -> (String, String) {
        let boundary = labels.len() - 2;
        (labels[..boundary].join("-"), labels[boundary..].join("."))
    }
}

/// Resolves inbound authorities with a configured policy.
#[derive(Debug)]
pub struct HostResolver {
    policy: Box<dyn RoutingPolicy>,
}

impl HostResolver {
    pub fn new(policy: Box<dyn RoutingPolicy>) -> Self {
        Self { policy }
    }

    /// Build a resolver from the `policy.composite_subdomains` flag.
    pub fn from_flag(composite_subdomains: bool) -> Self {
        if composite_subdomains {
            Self::new(Box::new(CompositeSubdomain))
        } else {
            Self::new(Box::new(LeftmostLabel))
        }
    }

    /// Resolve an authority such as `shop.example.com`.
    pub fn resolve(&self, authority: &str) -> ProxyResult<HostKey> {
        let labels: Vec<&str> = authority.split('.').collect();
        if labels.len() < MIN_LABELS || labels.iter().any(|label| label.is_empty()) {
            return Err(ProxyError::InvalidHost(authority.to_string()));
        }

        let (routing_key, original_suffix) = self.policy.split(&labels);
        Ok(HostKey {
            routing_key,
            original_suffix,
            client_host: authority.to_string(),
        })
    }
}

impl Default for HostResolver {
    fn default() -> Self {
        Self::new(Box::new(LeftmostLabel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leftmost_label() {
        let key = HostResolver::default().resolve("shop.example.com").unwrap();
        assert_eq!(key.routing_key, "shop");
        assert_eq!(key.original_suffix, "example.com");
        assert_eq!(key.client_host, "shop.example.com");
    }

    #[test]
    fn test_extra_labels_stay_in_suffix() {
        let key = HostResolver::default().resolve("shop.eu.example.com").unwrap();
        assert_eq!(key.routing_key, "shop");
        assert_eq!(key.original_suffix, "eu.example.com");
    }

    #[test]
    fn test_port_is_kept() {
        let key = HostResolver::default().resolve("shop.example.com:8080").unwrap();
        assert_eq!(key.routing_key, "shop");
        assert_eq!(key.original_suffix, "example.com:8080");
        assert_eq!(key.client_host, "shop.example.com:8080");
    }

    #[test]
    fn test_too_few_labels() {
        let resolver = HostResolver::default();
        assert!(matches!(resolver.resolve("a.b"), Err(ProxyError::InvalidHost(_))));
        assert!(matches!(resolver.resolve("localhost"), Err(ProxyError::InvalidHost(_))));
        assert!(matches!(resolver.resolve(""), Err(ProxyError::InvalidHost(_))));
    }

    #[test]
    fn test_empty_label_rejected() {
        let resolver = HostResolver::default();
        assert!(resolver.resolve(".example.com").is_err());
        assert!(resolver.resolve("shop..com").is_err());
    }

    #[test]
    fn test_composite_subdomain() {
        let resolver = HostResolver::from_flag(true);

        let key = resolver.resolve("shop.eu.example.com").unwrap();
        assert_eq!(key.routing_key, "shop-eu");
        assert_eq!(key.original_suffix, "example.com");
        assert_eq!(key.client_host, "shop.eu.example.com");

        // Three labels behave like the leftmost policy
        let key = resolver.resolve("shop.example.com").unwrap();
        assert_eq!(key.routing_key, "shop");
        assert_eq!(key.original_suffix, "example.com");
    }
}
