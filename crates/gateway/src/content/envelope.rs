//! Content store response envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `{ data, meta }` as returned by the content store.
///
/// `data` is an entity, a sequence of entities, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEnvelope {
    #[serde(default)]
    pub data: Value,

    #[serde(default = "empty_meta")]
    pub meta: Value,
}

fn empty_meta() -> Value {
    Value::Object(Map::new())
}

impl EntityEnvelope {
    /// Envelope with null data, used for empty upstream bodies.
    pub fn empty() -> Self {
        Self {
            data: Value::Null,
            meta: empty_meta(),
        }
    }

    /// Entities carried by `data`: the sequence itself, a lone entity, or
    /// nothing for null.
    pub fn entries(&self) -> &[Value] {
        match &self.data {
            Value::Array(items) => items,
            Value::Null => &[],
            single => std::slice::from_ref(single),
        }
    }

    /// Whether `data` carries no entity.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Unwrap the first entity, keeping `meta`.
    pub fn into_first(self) -> Option<EntityEnvelope> {
        let data = match self.data {
            Value::Array(items) => items.into_iter().next()?,
            Value::Null => return None,
            single => single,
        };
        Some(EntityEnvelope {
            data,
            meta: self.meta,
        })
    }
}
