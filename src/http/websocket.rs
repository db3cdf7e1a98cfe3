//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Dial the secondary backend before touching the client connection
//! - Complete the upgrade handshake with the client
//! - Bidirectional frame forwarding until either side stops
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Secondary
//! ```
//!
//! # Design Decisions
//! - WebSocket traffic always targets the secondary; no primary attempt
//! - Data and close frames are forwarded unchanged, one for one; payloads are
//!   never rewritten
//! - Ping and pong stay hop-local: each side's socket answers its own peer's
//!   pings, so relaying them would produce a second pong
//! - Each pump owns one read half and one write half, so no locking is needed
//! - The first pump to stop ends the session; both sides are then closed

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::FromRequestParts;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as BackendCloseFrame;
use tokio_tungstenite::tungstenite::Message as BackendMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::Instrument;

use crate::error::{ProxyError, ProxyResult};
use crate::http::request::path_and_query;
use crate::observability::metrics;
use crate::routing::{BackendTarget, HostKey};

/// Backend side of a relay session.
pub type BackendSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Settings the relay needs from the proxy configuration.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub resolve: HashMap<String, SocketAddr>,
    pub connect_timeout: Duration,
    pub close_timeout: Duration,
}

/// Relay an upgrade request to the secondary target of `key`.
pub async fn relay(
    settings: RelaySettings,
    target: BackendTarget,
    key: HostKey,
    request: Request<Body>,
) -> Response {
    let path = path_and_query(&request);
    let backend = match dial(&settings, &target, &path).await {
        Ok(backend) => backend,
        Err(err) => {
            tracing::error!(error = %err, "Failed to connect to target");
            return err.into_response();
        }
    };

    let (mut parts, _body) = request.into_parts();
    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            let err = ProxyError::RelayUpgrade(rejection.body_text());
            tracing::error!(error = %err, "Failed to upgrade client connection");
            let mut backend = backend;
            let _ = backend.close(None).await;
            // The rejection carries its own response
            return rejection.into_response();
        }
    };

    let span = tracing::info_span!(
        "relay",
        routing_key = %key.routing_key,
        backend = %target.hostname,
    );
    let close_timeout = settings.close_timeout;
    upgrade
        .on_failed_upgrade(|e: axum::Error| {
            tracing::error!(error = %ProxyError::RelayUpgrade(e.to_string()), "Client upgrade failed");
        })
        .on_upgrade(move |client| run_session(client, backend, close_timeout).instrument(span))
}

/// Open the backend WebSocket, honoring static resolve overrides.
pub async fn dial(
    settings: &RelaySettings,
    target: &BackendTarget,
    path: &str,
) -> ProxyResult<BackendSocket> {
    let dial_error = |reason: String| ProxyError::RelayDial {
        target: target.hostname.clone(),
        reason,
    };

    let url = target.ws_url(path).map_err(|e| dial_error(e.to_string()))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| dial_error("no port for scheme".to_string()))?;

    let connect = async {
        match settings.resolve.get(&target.hostname) {
            Some(addr) => TcpStream::connect(*addr).await,
            None => TcpStream::connect((target.hostname.as_str(), port)).await,
        }
    };
    let stream = tokio::time::timeout(settings.connect_timeout, connect)
        .await
        .map_err(|_| dial_error("connect timed out".to_string()))?
        .map_err(|e| dial_error(e.to_string()))?;

    match tokio_tungstenite::client_async_tls(url.as_str(), stream).await {
        Ok((socket, response)) => {
            tracing::debug!(%url, status = response.status().as_u16(), "Connected to target");
            Ok(socket)
        }
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            tracing::error!(
                status = %response.status(),
                headers = ?response.headers(),
                "Handshake rejected by target"
            );
            Err(dial_error(format!("handshake rejected with {}", response.status())))
        }
        Err(e) => Err(dial_error(e.to_string())),
    }
}

/// Pump frames both ways until either direction stops, then close both.
async fn run_session(client: WebSocket, backend: BackendSocket, close_timeout: Duration) {
    metrics::relay_session_opened();
    tracing::info!("Relay session started");

    let (mut client_tx, mut client_rx) = client.split();
    let (mut backend_tx, mut backend_rx) = backend.split();

    let ended_by = tokio::select! {
        reason = client_to_backend(&mut client_rx, &mut backend_tx) => reason,
        reason = backend_to_client(&mut backend_rx, &mut client_tx) => reason,
    };

    let closed = tokio::time::timeout(close_timeout, async {
        let _ = client_tx.close().await;
        let _ = backend_tx.close().await;
    })
    .await;
    if closed.is_err() {
        tracing::warn!("Timed out closing relay connections");
    }

    metrics::relay_session_closed();
    tracing::info!(ended_by, "Relay session closed");
}

async fn client_to_backend(
    source: &mut SplitStream<WebSocket>,
    sink: &mut SplitSink<BackendSocket, BackendMessage>,
) -> &'static str {
    while let Some(message) = source.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read from client");
                return "client_error";
            }
        };
        let is_close = matches!(message, Message::Close(_));
        let Some(message) = to_backend(message) else {
            continue;
        };
        if let Err(e) = sink.send(message).await {
            tracing::debug!(error = %e, "Failed to write to target");
            return "backend_error";
        }
        metrics::record_relay_message("to_backend");
        if is_close {
            return "client_closed";
        }
    }
    "client_closed"
}

async fn backend_to_client(
    source: &mut SplitStream<BackendSocket>,
    sink: &mut SplitSink<WebSocket, Message>,
) -> &'static str {
    while let Some(message) = source.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read from target");
                return "backend_error";
            }
        };
        let is_close = matches!(message, BackendMessage::Close(_));
        let Some(message) = to_client(message) else {
            continue;
        };
        if let Err(e) = sink.send(message).await {
            tracing::debug!(error = %e, "Failed to write to client");
            return "client_error";
        }
        metrics::record_relay_message("to_client");
        if is_close {
            return "backend_closed";
        }
    }
    "backend_closed"
}

/// Client frame → backend frame, same type and payload. Control frames
/// other than close are answered locally and not relayed.
fn to_backend(message: Message) -> Option<BackendMessage> {
    let message = match message {
        Message::Text(text) => BackendMessage::Text(text.as_str().to_owned().into()),
        Message::Binary(data) => BackendMessage::Binary(data),
        Message::Ping(_) | Message::Pong(_) => return None,
        Message::Close(frame) => BackendMessage::Close(frame.map(|frame| BackendCloseFrame {
            code: frame.code.into(),
            reason: frame.reason.as_str().to_owned().into(),
        })),
    };
    Some(message)
}

/// Backend frame → client frame. Raw frames never surface from a read.
fn to_client(message: BackendMessage) -> Option<Message> {
    let message = match message {
        BackendMessage::Text(text) => Message::Text(text.as_str().to_owned().into()),
        BackendMessage::Binary(data) => Message::Binary(data),
        BackendMessage::Ping(_) | BackendMessage::Pong(_) => return None,
        BackendMessage::Close(frame) => Message::Close(frame.map(|frame| CloseFrame {
            code: frame.code.into(),
            reason: frame.reason.as_str().to_owned().into(),
        })),
        BackendMessage::Frame(_) => return None,
    };
    Some(message)
}
