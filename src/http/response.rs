//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn the orchestrator's chosen response into the client response
//! - Copy the serving backend's headers
//! - Drop framing headers that no longer match the rewritten body
//!
//! # Design Decisions
//! - Repeated headers are appended, so multi-value headers survive unless
//!   the forwarder already flattened them
//! - A result without a status (no backend answered at all) is written as
//!   an empty default response rather than a synthesized gateway error
//! - `Content-Length` survives only where no body follows by protocol (HEAD,
//!   204, 304); everywhere else it is recomputed from the body we send

use axum::body::Body;
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::response::Response;

use crate::proxy::ProxiedResponse;

/// Headers describing the backend's framing of a body we have replaced.
const FRAMING_HEADERS: [HeaderName; 2] = [header::CONTENT_LENGTH, header::TRANSFER_ENCODING];

/// True when the response carries no body regardless of its headers.
fn is_bodiless(method: &Method, status: StatusCode) -> bool {
    *method == Method::HEAD
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

/// Build the client response from the authoritative backend result.
pub fn into_client_response(proxied: ProxiedResponse, method: &Method) -> Response {
    let Some(status) = proxied.status else {
        return Response::default();
    };
    let keep_length = is_bodiless(method, status);

    let mut response = Response::new(Body::from(proxied.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in proxied.headers.iter() {
        if FRAMING_HEADERS.contains(name) && !(keep_length && *name == header::CONTENT_LENGTH) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    response
}
