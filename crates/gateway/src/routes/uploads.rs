//! Uploaded media proxy.
//!
//! Streams `/uploads/*` from the content store without buffering and marks
//! the response cacheable and embeddable cross-origin.

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, Response, StatusCode, header},
    routing::get,
};

use crate::content::ContentError;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

const CACHE_CONTROL: &str = "public, max-age=31536000";
const CROSS_ORIGIN_RESOURCE_POLICY: &str = "cross-origin-resource-policy";

/// Create the uploads router.
pub fn router() -> Router<AppState> {
    Router::new().route("/uploads/{*path}", get(serve_upload))
}

async fn serve_upload(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> AppResult<Response<Body>> {
    let path = path.trim_start_matches('/');
    let traverses = path.split('/').any(|segment| segment == ".." || segment == ".");
    if path.is_empty() || traverses || path.contains('\0') {
        return Err(image_not_found());
    }
    let Some(url) = state.strapi().upload_url(path) else {
        return Err(image_not_found());
    };

    let upstream = match state.strapi().fetch_upload(url).await {
        Ok(response) => response,
        Err(ContentError::UpstreamError { status: 404, .. }) => return Err(image_not_found()),
        Err(e) => return Err(e.into()),
    };

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, CACHE_CONTROL)
        .header(CROSS_ORIGIN_RESOURCE_POLICY, "cross-origin")
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| AppError::Internal(e.into()))
}

fn image_not_found() -> AppError {
    AppError::NotFound("image not found".to_string())
}
