//! Content layer errors.

use thiserror::Error;

use super::EntityKind;
use crate::query::QueryError;

/// Failures of a content store call or an identifier resolution.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Every candidate came back empty, or a direct-id call got a 404.
    #[error("{kind} `{identifier}` not found")]
    NotFound {
        kind: EntityKind,
        identifier: String,
    },

    /// Network failure or timeout; no response was received.
    #[error("content store unavailable: {cause}")]
    UpstreamUnavailable { cause: String },

    /// The content store answered with a non-2xx status.
    #[error("content store returned {status}")]
    UpstreamError { status: u16, body: String },

    /// Client-supplied query rejected at the boundary.
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    /// A 2xx response whose body is not an envelope.
    #[error("malformed content store response: {0}")]
    MalformedResponse(String),
}

impl ContentError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentError::NotFound { .. } => "not_found",
            ContentError::UpstreamUnavailable { .. } => "upstream_unavailable",
            ContentError::UpstreamError { .. } => "upstream_error",
            ContentError::InvalidQuery(_) => "invalid_query",
            ContentError::MalformedResponse(_) => "malformed_response",
        }
    }

    pub(crate) fn unavailable(err: &reqwest::Error) -> Self {
        let cause = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };
        ContentError::UpstreamUnavailable { cause }
    }

    /// Turn an upstream 404 on a direct-id call into `NotFound`.
    pub(crate) fn not_found_on_404(self, kind: EntityKind, identifier: &str) -> Self {
        match self {
            ContentError::UpstreamError { status: 404, .. } => ContentError::NotFound {
                kind,
                identifier: identifier.to_string(),
            },
            other => other,
        }
    }
}
