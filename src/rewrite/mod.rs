//! Response body rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! still-encoded backend body
//!     → codec.rs (decode with the response's own Content-Encoding)
//!     → domain.rs (backend hostname → client hostname)
//!     → codec.rs (re-encode with the negotiated encoding)
//!     → client body
//! ```
//!
//! # Design Decisions
//! - Whole-buffer processing; bodies are already buffered by the forwarder
//! - A body that fails to decode is passed through byte-for-byte, unrewritten
//! - Never turns a codec failure into a client-facing error

pub mod codec;
pub mod domain;

use axum::body::Bytes;

use crate::error::ProxyError;
use crate::observability::metrics;
pub use codec::Encoding;

/// How a body should be transformed on its way to the client.
#[derive(Debug, Clone, Copy)]
pub struct RewritePlan<'a> {
    /// Encoding the backend applied to this body.
    pub decode_with: Encoding,
    /// Encoding to apply before writing to the client.
    pub encode_with: Encoding,
    pub backend_host: &'a str,
    pub client_host: &'a str,
}

/// Result of running a body through the pipeline.
#[derive(Debug, Clone)]
pub struct RewrittenBody {
    pub body: Bytes,
    /// Number of hostname occurrences replaced.
    pub replacements: usize,
    /// True when the body could not be decoded and was passed through.
    pub passed_through: bool,
}

impl RewrittenBody {
    fn passthrough(body: Bytes) -> Self {
        Self {
            body,
            replacements: 0,
            passed_through: true,
        }
    }
}

/// Decode, rewrite and re-encode one body.
pub fn rewrite_body(raw: Bytes, plan: RewritePlan<'_>) -> RewrittenBody {
    if raw.is_empty() {
        return RewrittenBody {
            body: raw,
            replacements: 0,
            passed_through: false,
        };
    }

    let decoded = match codec::decode(&raw, plan.decode_with) {
        Ok(decoded) => decoded,
        Err(source) => {
            let err = ProxyError::Decode {
                encoding: plan.decode_with.as_str(),
                source,
            };
            tracing::warn!(error = %err, bytes = raw.len(), "Passing body through unmodified");
            metrics::record_decode_fallback(plan.decode_with.as_str());
            return RewrittenBody::passthrough(raw);
        }
    };

    let replacements = domain::count_matches(&decoded, plan.backend_host);
    let rewritten = if replacements > 0 {
        domain::rewrite(&decoded, plan.backend_host, plan.client_host)
    } else {
        decoded
    };

    match codec::encode(&rewritten, plan.encode_with) {
        Ok(encoded) => RewrittenBody {
            body: Bytes::from(encoded),
            replacements,
            passed_through: false,
        },
        Err(e) => {
            tracing::error!(
                error = %e,
                encoding = %plan.encode_with,
                "Re-encoding failed, passing original body through"
            );
            RewrittenBody::passthrough(raw)
        }
    }
}
