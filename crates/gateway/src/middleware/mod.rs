//! HTTP middleware components.

pub mod error_details;

pub use error_details::expose_error_details;
