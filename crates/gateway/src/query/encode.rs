//! Bracket-path query string encoder.
//!
//! Keys are written raw (`filters[slug][$eq]`), values are percent-encoded
//! keeping only the RFC 3986 unreserved set. Arrays use indices, empty
//! arrays and maps emit nothing.

use serde_json::{Map, Value};

use super::QuerySpec;

/// Encode a spec. Sections appear as populate, filters, sort, pagination,
/// fields; maps are encoded in key order and arrays in their own order.
pub fn encode(spec: &QuerySpec) -> String {
    let mut pairs = Vec::new();
    for (name, value) in spec.sections() {
        push_pairs(name.to_string(), &value, &mut pairs);
    }
    pairs.join("&")
}

/// Encode an arbitrary parameter map with the same rules.
pub fn encode_map(params: &Map<String, Value>) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params {
        push_pairs(key.clone(), value, &mut pairs);
    }
    pairs.join("&")
}

fn push_pairs(prefix: String, value: &Value, pairs: &mut Vec<String>) {
    match value {
        Value::Null => pairs.push(format!("{prefix}=")),
        Value::Bool(b) => pairs.push(format!("{prefix}={b}")),
        Value::Number(n) => pairs.push(format!("{prefix}={n}")),
        Value::String(s) => pairs.push(format!("{prefix}={}", urlencoding::encode(s))),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                push_pairs(format!("{prefix}[{index}]"), item, pairs);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                push_pairs(format!("{prefix}[{key}]"), item, pairs);
            }
        }
    }
}
