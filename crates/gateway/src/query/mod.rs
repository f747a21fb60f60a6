//! Content store query language.
//!
//! Builds and parses the nested bracket-path query strings the content
//! store expects (`populate[images][populate][file][populate]=%2A`,
//! `filters[slug][$eq]=foo`).

mod encode;
mod parse;
mod types;

pub use encode::{encode, encode_map};
pub use parse::{MAX_DEPTH, parse};
pub use types::{FilterOperator, Filters, PageWindow, Pagination, Populate, QuerySpec, Relation};

use thiserror::Error;

/// Errors raised while reading a client-supplied query.
///
/// Encoding never fails; only parsing and lifting into a [`QuerySpec`] do.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("malformed query key `{0}`")]
    MalformedKey(String),

    #[error("query key `{0}` nests too deeply")]
    TooDeep(String),

    #[error("invalid percent-encoding in `{0}`")]
    Encoding(String),

    #[error("conflicting values for query key `{0}`")]
    Conflict(String),

    #[error("unsupported query parameter `{0}`")]
    UnknownParameter(String),

    #[error("invalid `{param}`: {reason}")]
    InvalidValue { param: String, reason: String },
}

impl QueryError {
    pub(crate) fn invalid(param: impl Into<String>, reason: impl Into<String>) -> Self {
        QueryError::InvalidValue {
            param: param.into(),
            reason: reason.into(),
        }
    }
}

impl QuerySpec {
    /// Encode into the content store's query string.
    pub fn to_query_string(&self) -> String {
        encode(self)
    }

    /// Parse a client query string into a spec.
    pub fn parse(query: &str) -> Result<Self, QueryError> {
        Self::from_value(parse(query)?)
    }
}
