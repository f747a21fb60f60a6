//! Write-side pass-through to the content store.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use super::slug::derive_slug;
use super::{ContentError, ContentStore, EntityEnvelope, EntityKind};

/// Creates, updates and deletes catalog entries.
///
/// No validation happens here beyond deriving a category slug from its
/// title; the content store rejects bad payloads itself.
#[derive(Clone)]
pub struct ContentWriter {
    store: Arc<dyn ContentStore>,
}

impl ContentWriter {
    /// Create a writer over a content store.
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Create an entry.
    pub async fn create(
        &self,
        kind: EntityKind,
        data: Value,
    ) -> Result<EntityEnvelope, ContentError> {
        let data = prepare(kind, data);
        let created = self.store.create(kind.collection(), data).await?;
        info!(%kind, "created entry");
        Ok(created)
    }

    /// Update the entry with the given id (document id on Strapi 5).
    pub async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        data: Value,
    ) -> Result<EntityEnvelope, ContentError> {
        let data = prepare(kind, data);
        let updated = self
            .store
            .update(kind.collection(), id, data)
            .await
            .map_err(|e| e.not_found_on_404(kind, id))?;
        info!(%kind, id, "updated entry");
        Ok(updated)
    }

    /// Delete the entry with the given id.
    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<EntityEnvelope, ContentError> {
        let deleted = self
            .store
            .delete(kind.collection(), id)
            .await
            .map_err(|e| e.not_found_on_404(kind, id))?;
        info!(%kind, id, "deleted entry");
        Ok(deleted)
    }
}

fn prepare(kind: EntityKind, mut data: Value) -> Value {
    if kind == EntityKind::Category {
        derive_slug(&mut data);
    }
    data
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct RecordingStore {
        writes: Mutex<Vec<(String, String, Option<Value>)>>,
        missing: bool,
    }

    impl RecordingStore {
        fn record(&self, op: &str, path: String, data: Option<Value>) -> Result<EntityEnvelope, ContentError> {
            self.writes.lock().push((op.to_string(), path, data.clone()));
            if self.missing {
                return Err(ContentError::UpstreamError {
                    status: 404,
                    body: r#"{"error":{"status":404}}"#.to_string(),
                });
            }
            Ok(EntityEnvelope {
                data: data.unwrap_or(Value::Null),
                meta: json!({}),
            })
        }
    }

    #[async_trait]
    impl ContentStore for RecordingStore {
        async fn find(&self, _: &str, _: &str) -> Result<EntityEnvelope, ContentError> {
            unimplemented!()
        }

        async fn create(&self, collection: &str, data: Value) -> Result<EntityEnvelope, ContentError> {
            self.record("create", collection.to_string(), Some(data))
        }

        async fn update(
            &self,
            collection: &str,
            id: &str,
            data: Value,
        ) -> Result<EntityEnvelope, ContentError> {
            self.record("update", format!("{collection}/{id}"), Some(data))
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<EntityEnvelope, ContentError> {
            self.record("delete", format!("{collection}/{id}"), None)
        }
    }

    #[tokio::test]
    async fn category_create_derives_slug() {
        let store = Arc::new(RecordingStore::default());
        let writer = ContentWriter::new(store.clone());

        let created = writer
            .create(EntityKind::Category, json!({ "title": "Desk Lamps" }))
            .await
            .unwrap();

        assert_eq!(created.data["slug"], json!("desk-lamps"));
        let writes = store.writes.lock();
        assert_eq!(writes[0].0, "create");
        assert_eq!(writes[0].1, "product-categories");
    }

    #[tokio::test]
    async fn category_update_derives_slug_only_when_missing() {
        let store = Arc::new(RecordingStore::default());
        let writer = ContentWriter::new(store.clone());

        let updated = writer
            .update(
                EntityKind::Category,
                "cat1",
                json!({ "title": "Floor Lamps", "slug": "floor" }),
            )
            .await
            .unwrap();
        assert_eq!(updated.data["slug"], json!("floor"));
        assert_eq!(store.writes.lock()[0].1, "product-categories/cat1");
    }

    #[tokio::test]
    async fn product_payload_is_passed_through() {
        let store = Arc::new(RecordingStore::default());
        let writer = ContentWriter::new(store.clone());

        let created = writer
            .create(EntityKind::Product, json!({ "title": "Blue Widget" }))
            .await
            .unwrap();
        assert!(created.data.get("slug").is_none());
    }

    #[tokio::test]
    async fn missing_entry_is_not_found() {
        let store = Arc::new(RecordingStore {
            missing: true,
            ..RecordingStore::default()
        });
        let writer = ContentWriter::new(store);

        let err = writer
            .delete(EntityKind::Version, "v9")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ContentError::NotFound { kind: EntityKind::Version, ref identifier } if identifier == "v9"
        ));
    }
}
