//! Application error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::content::ContentError;
use crate::query::QueryError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("{0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        AppError::Content(ContentError::InvalidQuery(err))
    }
}

/// JSON error body.
///
/// `details` is only serialized when the error-details middleware puts it
/// back in development mode; the full report rides along as a response
/// extension.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Content(ContentError::NotFound { .. }) | AppError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::Content(ContentError::UpstreamError { status, .. }) => {
                upstream_status(*status)
            }
            AppError::Content(ContentError::InvalidQuery(_)) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Content(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn report(&self) -> ErrorReport {
        match self {
            AppError::Content(e @ ContentError::NotFound { .. }) => ErrorReport {
                error: e.kind(),
                message: e.to_string(),
                details: None,
            },
            AppError::Content(e @ ContentError::InvalidQuery(_)) => ErrorReport {
                error: e.kind(),
                message: e.to_string(),
                details: None,
            },
            AppError::Content(e @ ContentError::UpstreamError { body, .. }) => {
                tracing::warn!(error = %e, body = %body, "content store error");
                ErrorReport {
                    error: e.kind(),
                    message: e.to_string(),
                    details: Some(body.clone()),
                }
            }
            AppError::Content(e) => {
                tracing::error!(error = %e, "content store failure");
                ErrorReport {
                    error: e.kind(),
                    message: "content store request failed".to_string(),
                    details: Some(e.to_string()),
                }
            }
            AppError::NotFound(message) => ErrorReport {
                error: "not_found",
                message: message.clone(),
                details: None,
            },
            AppError::BadRequest(message) => ErrorReport {
                error: "bad_request",
                message: message.clone(),
                details: None,
            },
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                ErrorReport {
                    error: "internal",
                    message: "internal server error".to_string(),
                    details: Some(format!("{e:#}")),
                }
            }
        }
    }
}

/// Pass an upstream status through unless it says our own credentials are
/// wrong or is not an error status at all.
fn upstream_status(status: u16) -> StatusCode {
    match status {
        401 | 403 | 407 => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::from_u16(status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let report = self.report();

        // Client-facing body never carries details; the middleware in
        // `crate::middleware` re-adds them in development.
        let public = ErrorReport {
            details: None,
            ..report.clone()
        };
        let mut response = (status, Json(public)).into_response();
        response.extensions_mut().insert(report);
        response
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
