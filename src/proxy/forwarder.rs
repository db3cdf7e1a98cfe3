//! Backend forwarder.
//!
//! # Responsibilities
//! - Issue one proxied request against one backend target
//! - Capture status, headers and the still-encoded body
//! - Turn transport failures into data instead of errors
//!
//! # Design Decisions
//! - The inbound body is buffered once and replayed per attempt
//! - No automatic decompression or redirect following in the client
//! - Dropping the returned future aborts the in-flight backend call, so a
//!   client disconnect cancels the attempt

use std::future::Future;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode};

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::error::ProxyError;
use crate::routing::BackendTarget;

/// The parts of the inbound request replayed against each target.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Original request URI (path and query).
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Outcome of one forwarder call.
#[derive(Debug)]
pub struct AttemptResult {
    /// Absent when no response head was received.
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    /// Body bytes exactly as the backend sent them.
    pub body: Bytes,
    pub transport_error: Option<ProxyError>,
}

impl AttemptResult {
    fn transport_failure(err: ProxyError) -> Self {
        Self {
            status: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            transport_error: Some(err),
        }
    }

    /// The failover trigger: a transport error or a status of 400 or above.
    pub fn is_failure(&self) -> bool {
        self.transport_error.is_some()
            || self.status.map_or(true, |status| status.as_u16() >= 400)
    }

    /// Short label for logs and metrics.
    pub fn result_label(&self) -> &'static str {
        if self.transport_error.is_some() {
            "transport"
        } else if self.is_failure() {
            "status"
        } else {
            "ok"
        }
    }

    /// The `Content-Encoding` header value, if any.
    pub fn content_encoding(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
    }
}

/// Something that can carry one attempt to a backend target.
pub trait Upstream: Send + Sync {
    /// Forward the request to `target` and collect the full response.
    fn forward(
        &self,
        target: &BackendTarget,
        request: &InboundRequest,
    ) -> impl Future<Output = AttemptResult> + Send;
}

/// Sends attempts to backend targets over a shared HTTP client.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    flatten_headers: bool,
}

impl Forwarder {
    /// Build the outbound client from upstream and timeout settings.
    pub fn new(
        upstream: &UpstreamConfig,
        timeouts: &TimeoutConfig,
        flatten_headers: bool,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.request_secs))
            .redirect(reqwest::redirect::Policy::none());

        for (host, addr) in &upstream.resolve {
            builder = builder.resolve(host, *addr);
        }

        Ok(Self {
            client: builder.build()?,
            flatten_headers,
        })
    }
}

impl Upstream for Forwarder {
    async fn forward(&self, target: &BackendTarget, request: &InboundRequest) -> AttemptResult {
        let url = match target.http_url(&request.path_and_query) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(backend = %target.hostname, error = %e, "Invalid target URL");
                return AttemptResult::transport_failure(ProxyError::BackendTransport {
                    target: target.identifier.clone(),
                    source: None,
                    reason: e.to_string(),
                });
            }
        };

        tracing::debug!(backend = %target.identifier, role = %target.role, %url, "Proxying request");

        // The outbound client derives Host from the target URL
        let mut headers = request.headers.clone();
        headers.remove(header::HOST);

        let response = match self
            .client
            .request(request.method.clone(), url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(backend = %target.identifier, error = %e, "Backend request failed");
                return AttemptResult::transport_failure(ProxyError::BackendTransport {
                    target: target.identifier.clone(),
                    reason: e.to_string(),
                    source: Some(e),
                });
            }
        };

        let status = response.status();
        let headers = if self.flatten_headers {
            flatten(response.headers())
        } else {
            response.headers().clone()
        };

        tracing::debug!(backend = %target.identifier, status = status.as_u16(), "Received status code");

        match response.bytes().await {
            Ok(body) => AttemptResult {
                status: Some(status),
                headers,
                body,
                transport_error: None,
            },
            Err(e) => {
                tracing::warn!(backend = %target.identifier, error = %e, "Backend body read failed");
                AttemptResult {
                    status: Some(status),
                    headers,
                    body: Bytes::new(),
                    transport_error: Some(ProxyError::BackendTransport {
                        target: target.identifier.clone(),
                        reason: e.to_string(),
                        source: Some(e),
                    }),
                }
            }
        }
    }
}

/// Collapse repeated headers to their last value.
pub fn flatten(headers: &HeaderMap) -> HeaderMap {
    let mut flat = HeaderMap::with_capacity(headers.keys_len());
    for (name, value) in headers {
        flat.insert(name.clone(), value.clone());
    }
    flat
}
