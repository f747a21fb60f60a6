//! Catalog gateway library.
//!
//! Exposes the router and its building blocks for integration testing.
//! The main entry point for running the server is the `catalog-gateway`
//! binary.

pub mod config;
pub mod content;
pub mod error;
pub mod middleware;
pub mod query;
pub mod routes;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Assemble every route and the state-aware middleware.
///
/// CORS and request tracing are added by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::catalog::router())
        .merge(routes::uploads::router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::expose_error_details,
        ))
        .with_state(state)
}
