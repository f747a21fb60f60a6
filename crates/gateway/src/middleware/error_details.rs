//! Development-mode error details.
//!
//! Error responses carry their full [`ErrorReport`] as a response extension.
//! In development the body is rebuilt from it so upstream bodies and
//! transport causes are visible; in production the extension is ignored.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ErrorReport;
use crate::state::AppState;

/// Middleware re-attaching error details when the config allows it.
pub async fn expose_error_details(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !state.config().expose_error_details {
        return response;
    }

    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };
    if report.details.is_none() {
        return response;
    }

    (response.status(), Json(report)).into_response()
}
