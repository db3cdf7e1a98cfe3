//! Failover orchestration.
//!
//! # States
//! ```text
//! START → PRIMARY_ATTEMPT → DONE
//!                         ↘ SECONDARY_ATTEMPT → DONE
//! ```
//!
//! - The primary result is served when it passes the failure predicate
//! - Otherwise the secondary result is served as-is, whatever its status
//! - Attempts are strictly sequential; there is never a third attempt
//!
//! The re-encoding token for a secondary response is the one observed on
//! the primary response unless `strict_encoding_parity` is set. That mirrors
//! long-standing behavior and is likely a latent defect: a secondary body can
//! leave with an encoding that differs from its copied `Content-Encoding`.

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};

use crate::error::ProxyError;
use crate::observability::metrics;
use crate::proxy::forwarder::{AttemptResult, InboundRequest, Upstream};
use crate::rewrite::{rewrite_body, Encoding, RewritePlan};
use crate::routing::{BackendTarget, HostKey, Role, TargetNamer};

/// The single response chosen for the client.
#[derive(Debug)]
pub struct ProxiedResponse {
    pub served_by: Role,
    /// Absent only when the secondary attempt produced no response head.
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Drives the primary/secondary sequence for buffered requests.
#[derive(Debug)]
pub struct Orchestrator<U> {
    namer: TargetNamer,
    upstream: U,
    strict_encoding_parity: bool,
}

impl<U: Upstream> Orchestrator<U> {
    pub fn new(namer: TargetNamer, upstream: U, strict_encoding_parity: bool) -> Self {
        Self {
            namer,
            upstream,
            strict_encoding_parity,
        }
    }

    pub fn namer(&self) -> &TargetNamer {
        &self.namer
    }

    /// Run the failover sequence for one request.
    pub async fn handle(&self, key: &HostKey, request: &InboundRequest) -> ProxiedResponse {
        let primary = self.namer.primary(&key.routing_key);
        let first = self.upstream.forward(&primary, request).await;
        metrics::record_attempt(Role::Primary.as_str(), first.result_label());

        let primary_encoding = Encoding::from_header(first.content_encoding());
        if !first.is_failure() {
            return finish(&primary, first, primary_encoding, key);
        }

        let reason = match (&first.transport_error, first.status) {
            (Some(err), _) => err.to_string(),
            (None, Some(status)) => ProxyError::BackendStatus {
                target: primary.identifier.clone(),
                status,
            }
            .to_string(),
            (None, None) => "no response".to_string(),
        };
        tracing::info!(
            routing_key = %key.routing_key,
            reason = %reason,
            "Primary failed, failing over to secondary"
        );

        let secondary = self.namer.secondary(&key.routing_key);
        let second = self.upstream.forward(&secondary, request).await;
        metrics::record_attempt(Role::Secondary.as_str(), second.result_label());

        if let Some(err) = &second.transport_error {
            tracing::error!(
                routing_key = %key.routing_key,
                error = %err,
                "Secondary failed as well, serving its result unchanged"
            );
        }

        let encode_with = if self.strict_encoding_parity {
            Encoding::from_header(second.content_encoding())
        } else {
            primary_encoding
        };
        finish(&secondary, second, encode_with, key)
    }
}

fn finish(
    target: &BackendTarget,
    attempt: AttemptResult,
    encode_with: Encoding,
    key: &HostKey,
) -> ProxiedResponse {
    let decode_with = Encoding::from_header(attempt.content_encoding());
    let rewritten = rewrite_body(
        attempt.body,
        RewritePlan {
            decode_with,
            encode_with,
            backend_host: &target.hostname,
            client_host: &key.client_host,
        },
    );

    tracing::debug!(
        served_by = %target.role,
        status = attempt.status.map(|s| s.as_u16()),
        decoded = %decode_with,
        encoded = %encode_with,
        replacements = rewritten.replacements,
        passed_through = rewritten.passed_through,
        "Response ready"
    );

    ProxiedResponse {
        served_by: target.role,
        status: attempt.status,
        headers: attempt.headers,
        body: rewritten.body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;
    use crate::rewrite::codec;
    use crate::routing::HostResolver;
    use axum::http::{header, HeaderValue, Method};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted results and records which targets were called.
    #[derive(Default)]
    struct Scripted {
        results: Mutex<VecDeque<AttemptResult>>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(results: Vec<AttemptResult>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Upstream for Scripted {
        async fn forward(&self, target: &BackendTarget, _request: &InboundRequest) -> AttemptResult {
            self.calls.lock().unwrap().push(target.hostname.clone());
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected extra attempt")
        }
    }

    fn response(status: u16, encoding: Option<&'static str>, body: &[u8]) -> AttemptResult {
        let mut headers = HeaderMap::new();
        if let Some(encoding) = encoding {
            headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(encoding));
        }
        let encoded = codec::encode(body, Encoding::from_header(encoding)).unwrap();
        AttemptResult {
            status: Some(StatusCode::from_u16(status).unwrap()),
            headers,
            body: Bytes::from(encoded),
            transport_error: None,
        }
    }

    fn refused() -> AttemptResult {
        AttemptResult {
            status: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            transport_error: Some(ProxyError::BackendTransport {
                target: "shop-primary".into(),
                reason: "connection refused".into(),
                source: None,
            }),
        }
    }

    fn orchestrator(results: Vec<AttemptResult>, strict: bool) -> Orchestrator<Scripted> {
        let namer = TargetNamer::new(UpstreamConfig {
            domain: "upstream.net".into(),
            primary_suffix: "-primary".into(),
            secondary_suffix: "-secondary".into(),
            ..UpstreamConfig::default()
        });
        Orchestrator::new(namer, Scripted::new(results), strict)
    }

    fn request() -> InboundRequest {
        InboundRequest {
            method: Method::GET,
            path_and_query: "/".into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    fn shop() -> HostKey {
        HostResolver::default().resolve("shop.example.com").unwrap()
    }

    #[tokio::test]
    async fn test_primary_success_is_served() {
        let orch = orchestrator(
            vec![response(200, Some("gzip"), b"visit shop-primary.upstream.net today")],
            false,
        );

        let out = orch.handle(&shop(), &request()).await;

        assert_eq!(out.served_by, Role::Primary);
        assert_eq!(out.status, Some(StatusCode::OK));
        assert_eq!(out.headers[header::CONTENT_ENCODING], "gzip");
        let body = codec::decode(&out.body, Encoding::Gzip).unwrap();
        assert_eq!(body, b"visit shop.example.com today");
        assert_eq!(orch.upstream.calls(), vec!["shop-primary.upstream.net"]);
    }

    #[tokio::test]
    async fn test_failure_status_fails_over() {
        let orch = orchestrator(
            vec![
                response(503, None, b"down"),
                response(200, None, b"from shop-secondary.upstream.net"),
            ],
            false,
        );

        let out = orch.handle(&shop(), &request()).await;

        assert_eq!(out.served_by, Role::Secondary);
        assert_eq!(out.status, Some(StatusCode::OK));
        assert_eq!(&out.body[..], b"from shop.example.com");
        assert_eq!(
            orch.upstream.calls(),
            vec!["shop-primary.upstream.net", "shop-secondary.upstream.net"]
        );
    }

    #[tokio::test]
    async fn test_secondary_result_is_authoritative() {
        let orch = orchestrator(
            vec![response(500, None, b"a"), response(404, None, b"missing")],
            false,
        );

        let out = orch.handle(&shop(), &request()).await;

        assert_eq!(out.status, Some(StatusCode::NOT_FOUND));
        assert_eq!(&out.body[..], b"missing");
        assert_eq!(orch.upstream.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_fails_over() {
        let orch = orchestrator(vec![refused(), response(200, None, b"ok")], false);

        let out = orch.handle(&shop(), &request()).await;
        assert_eq!(out.served_by, Role::Secondary);
        assert_eq!(out.status, Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_both_unreachable_yields_empty_result() {
        let orch = orchestrator(vec![refused(), refused()], false);

        let out = orch.handle(&shop(), &request()).await;
        assert_eq!(out.served_by, Role::Secondary);
        assert_eq!(out.status, None);
        assert!(out.body.is_empty());
    }

    #[tokio::test]
    async fn test_secondary_reencoded_with_primary_encoding() {
        let orch = orchestrator(
            vec![
                response(502, Some("br"), b"bad gateway"),
                response(200, Some("gzip"), b"at shop-secondary.upstream.net"),
            ],
            false,
        );

        let out = orch.handle(&shop(), &request()).await;

        // Headers come from the secondary, the body encoding from the primary
        assert_eq!(out.headers[header::CONTENT_ENCODING], "gzip");
        let body = codec::decode(&out.body, Encoding::Brotli).unwrap();
        assert_eq!(body, b"at shop.example.com");
    }

    #[tokio::test]
    async fn test_secondary_reencoded_with_own_encoding_when_strict() {
        let orch = orchestrator(
            vec![
                response(502, Some("br"), b"bad gateway"),
                response(200, Some("gzip"), b"at shop-secondary.upstream.net"),
            ],
            true,
        );

        let out = orch.handle(&shop(), &request()).await;

        assert_eq!(out.headers[header::CONTENT_ENCODING], "gzip");
        let body = codec::decode(&out.body, Encoding::Gzip).unwrap();
        assert_eq!(body, b"at shop.example.com");
    }

    #[tokio::test]
    async fn test_undecodable_primary_body_passes_through() {
        let mut attempt = response(200, None, b"not really gzip");
        attempt
            .headers
            .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        let orch = orchestrator(vec![attempt], false);

        let out = orch.handle(&shop(), &request()).await;
        assert_eq!(out.status, Some(StatusCode::OK));
        assert_eq!(&out.body[..], b"not really gzip");
    }
}
