//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler as its only (fallback) route
//! - Wire up middleware (request ID, tracing, timeout)
//! - Bind server to listener and drain on shutdown
//! - Resolve the host key, then dispatch to the relay or the orchestrator

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::request::{
    buffer_request, is_websocket_upgrade, request_authority, RequestIdExt, UuidRequestId,
};
use crate::http::response::into_client_response;
use crate::http::websocket::{self, RelaySettings};
use crate::observability::metrics;
use crate::proxy::{Forwarder, Orchestrator};
use crate::routing::{HostResolver, TargetNamer};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<HostResolver>,
    pub orchestrator: Arc<Orchestrator<Forwarder>>,
    pub relay: RelaySettings,
    pub max_body_size: usize,
}

impl AppState {
    /// Build every request-handling component from configuration.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        let forwarder = Forwarder::new(
            &config.upstream,
            &config.timeouts,
            config.policy.flatten_headers,
        )?;
        let orchestrator = Orchestrator::new(
            TargetNamer::new(config.upstream.clone()),
            forwarder,
            config.policy.strict_encoding_parity,
        );

        Ok(Self {
            resolver: Arc::new(HostResolver::from_flag(config.policy.composite_subdomains)),
            orchestrator: Arc::new(orchestrator),
            relay: RelaySettings {
                resolve: config.upstream.resolve.clone(),
                connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
                close_timeout: Duration::from_secs(config.timeouts.relay_close_secs),
            },
            max_body_size: config.listener.max_body_size,
        })
    }
}

/// HTTP server for the failover proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, reqwest::Error> {
        let state = AppState::from_config(&config)?;
        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        // Two sequential attempts may each take the full upstream timeout
        let inbound_timeout = Duration::from_secs(
            config.timeouts.request_secs * 2 + config.timeouts.connect_secs,
        );

        // Every request target, including asterisk-form, reaches the handler
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(inbound_timeout)),
            )
    }

    /// Run the server until a shutdown signal arrives on `shutdown`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            domain = %self.config.upstream.domain,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

fn make_request_span(request: &Request<Body>) -> tracing::Span {
    let host = request_authority(request).unwrap_or_default();
    tracing::info_span!(
        "request",
        request_id = %request.request_id(),
        method = %request.method(),
        uri = %request.uri(),
        host = %host,
    )
}

/// Main proxy handler.
/// Resolves the host key, then relays WebSockets or runs the failover sequence.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();

    let authority = request_authority(&request).unwrap_or_default();
    tracing::info!(host = %authority, "Received request");

    let key = match state.resolver.resolve(&authority) {
        Ok(key) => key,
        Err(err) => {
            tracing::warn!(error = %err, "Rejecting request");
            return err.into_response();
        }
    };

    if is_websocket_upgrade(request.headers()) {
        let target = state.orchestrator.namer().secondary(&key.routing_key);
        return websocket::relay(state.relay.clone(), target, key, request).await;
    }

    let inbound = match buffer_request(request, state.max_body_size).await {
        Ok(inbound) => inbound,
        Err(err) => return err.into_response(),
    };

    let proxied = state.orchestrator.handle(&key, &inbound).await;
    metrics::record_request(
        proxied.served_by.as_str(),
        proxied.status.map_or(0, |s| s.as_u16()),
        start_time,
    );

    into_client_response(proxied, &inbound.method)
}
