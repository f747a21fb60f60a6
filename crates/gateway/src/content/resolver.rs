//! Identifier resolution against the content store.
//!
//! An opaque identifier is tried as each of the kind's candidate fields in
//! turn; the first non-empty result wins and later candidates are never
//! queried.

use std::sync::Arc;

use tracing::debug;

use super::{Candidate, ContentError, ContentStore, EntityEnvelope, EntityKind};
use crate::query::{Filters, QuerySpec};

/// Resolves catalog entities by identifier or filter.
///
/// Holds no per-request state; clone it freely.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn ContentStore>,
}

impl Resolver {
    /// Create a resolver over a content store.
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Resolve a single entity, trying the kind's candidates in order.
    ///
    /// `extra` filters and populate are merged in; the candidate's own filter
    /// replaces any extra condition on the same field.
    pub async fn resolve_one(
        &self,
        kind: EntityKind,
        identifier: &str,
        extra: Option<QuerySpec>,
    ) -> Result<EntityEnvelope, ContentError> {
        let candidates = kind.candidates(identifier);
        self.try_candidates(kind, identifier, &candidates, extra.unwrap_or_default())
            .await
    }

    /// Resolve a single entity by document id only, skipping the other
    /// candidate interpretations.
    pub async fn find_by_document_id(
        &self,
        kind: EntityKind,
        document_id: &str,
    ) -> Result<EntityEnvelope, ContentError> {
        let candidates = [Candidate::DocumentId(document_id.to_string())];
        self.try_candidates(kind, document_id, &candidates, QuerySpec::new())
            .await
    }

    /// Fetch a collection in one query with the kind's populate shape.
    ///
    /// `filters` are applied as given and win over filters in `extra`.
    pub async fn resolve_many(
        &self,
        kind: EntityKind,
        filters: Filters,
        extra: Option<QuerySpec>,
    ) -> Result<EntityEnvelope, ContentError> {
        let spec = QuerySpec::new()
            .with_populate(kind.default_populate())
            .merge(extra.unwrap_or_default())
            .merge(QuerySpec::new().with_filters(filters));

        debug!(%kind, "fetching collection");
        self.store
            .find(kind.collection(), &spec.to_query_string())
            .await
    }

    async fn try_candidates(
        &self,
        kind: EntityKind,
        identifier: &str,
        candidates: &[Candidate],
        extra: QuerySpec,
    ) -> Result<EntityEnvelope, ContentError> {
        for candidate in candidates {
            let query = candidate_query(kind, candidate, extra.clone()).to_query_string();
            debug!(%kind, identifier, field = candidate.field_name(), "trying candidate");

            let envelope = self.store.find(kind.collection(), &query).await?;
            if let Some(found) = envelope.into_first() {
                debug!(%kind, identifier, field = candidate.field_name(), "resolved");
                return Ok(found);
            }
        }

        debug!(%kind, identifier, tried = candidates.len(), "no candidate matched");
        Err(ContentError::NotFound {
            kind,
            identifier: identifier.to_string(),
        })
    }
}

fn candidate_query(kind: EntityKind, candidate: &Candidate, extra: QuerySpec) -> QuerySpec {
    let mut spec = QuerySpec::new()
        .with_populate(kind.default_populate())
        .merge(extra);
    spec.filters
        .set(candidate.field_name(), candidate.condition());
    spec
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use super::*;
    use crate::query::{FilterOperator, Populate, parse};

    /// In-memory store that evaluates top-level `$eq` filters.
    #[derive(Default)]
    struct FakeStore {
        entities: Vec<(String, Value)>,
        queries: Mutex<Vec<(String, String)>>,
        fail_with: Option<u16>,
    }

    impl FakeStore {
        fn with(mut self, collection: &str, entity: Value) -> Self {
            self.entities.push((collection.to_string(), entity));
            self
        }

        fn queries(&self) -> Vec<(String, String)> {
            self.queries.lock().clone()
        }
    }

    fn matches(entity: &Value, filters: &Value) -> bool {
        let Some(filters) = filters.as_object() else {
            return true;
        };
        filters.iter().all(|(field, condition)| {
            let Some(expected) = condition.get("$eq") else {
                return true;
            };
            let actual = match &entity[field] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            expected.as_str() == Some(actual.as_str())
        })
    }

    #[async_trait]
    impl ContentStore for FakeStore {
        async fn find(
            &self,
            collection: &str,
            query: &str,
        ) -> Result<EntityEnvelope, ContentError> {
            self.queries
                .lock()
                .push((collection.to_string(), query.to_string()));
            if let Some(status) = self.fail_with {
                return Err(ContentError::UpstreamError {
                    status,
                    body: "{}".to_string(),
                });
            }
            let parsed = parse(query).unwrap();
            let data: Vec<Value> = self
                .entities
                .iter()
                .filter(|(c, e)| c == collection && matches(e, &parsed["filters"]))
                .map(|(_, e)| e.clone())
                .collect();
            Ok(EntityEnvelope {
                meta: json!({ "pagination": { "total": data.len() } }),
                data: Value::Array(data),
            })
        }

        async fn create(&self, _: &str, _: Value) -> Result<EntityEnvelope, ContentError> {
            unimplemented!()
        }

        async fn update(&self, _: &str, _: &str, _: Value) -> Result<EntityEnvelope, ContentError> {
            unimplemented!()
        }

        async fn delete(&self, _: &str, _: &str) -> Result<EntityEnvelope, ContentError> {
            unimplemented!()
        }
    }

    fn widget() -> Value {
        json!({ "id": 3, "documentId": "abc123", "slug": "blue-widget", "title": "Blue Widget" })
    }

    fn resolver(store: FakeStore) -> (Resolver, Arc<FakeStore>) {
        let store = Arc::new(store);
        (Resolver::new(store.clone()), store)
    }

    #[tokio::test]
    async fn document_id_hit_short_circuits() {
        for kind in [EntityKind::Product, EntityKind::Version, EntityKind::ProductImage] {
            let (resolver, store) =
                resolver(FakeStore::default().with(kind.collection(), widget()));
            let found = resolver.resolve_one(kind, "abc123", None).await.unwrap();
            assert_eq!(found.data["id"], json!(3));
            assert_eq!(store.queries().len(), 1, "{kind} should stop at documentId");
        }
    }

    #[tokio::test]
    async fn exhausted_candidates_issue_one_query_each() {
        for kind in EntityKind::ALL {
            let (resolver, store) = resolver(FakeStore::default());
            let err = resolver.resolve_one(kind, "999", None).await.unwrap_err();
            assert!(matches!(err, ContentError::NotFound { kind: k, .. } if k == kind));
            assert_eq!(store.queries().len(), kind.candidate_fields().len());
        }
    }

    #[tokio::test]
    async fn slug_found_after_document_id_miss() {
        let (resolver, store) =
            resolver(FakeStore::default().with("products", widget()));
        let found = resolver
            .resolve_one(EntityKind::Product, "blue-widget", None)
            .await
            .unwrap();

        assert_eq!(found.data["documentId"], json!("abc123"));
        let queries = store.queries();
        // documentId, then slug; the numeric candidate is skipped.
        assert_eq!(queries.len(), 2);
        assert!(queries[0].1.contains("filters[documentId][$eq]=blue-widget"));
        assert!(queries[1].1.contains("filters[slug][$eq]=blue-widget"));
        assert!(queries.iter().all(|(c, _)| c == "products"));
    }

    #[tokio::test]
    async fn category_numeric_id_hits_first() {
        let (resolver, store) = resolver(FakeStore::default().with(
            "product-categories",
            json!({ "id": 42, "documentId": "cat42", "slug": "lamps" }),
        ));
        let found = resolver
            .resolve_one(EntityKind::Category, "42", None)
            .await
            .unwrap();

        assert_eq!(found.data["slug"], json!("lamps"));
        let queries = store.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(
            queries[0].1,
            "populate[images][populate][file][populate]=%2A&filters[id][$eq]=42"
        );
    }

    #[tokio::test]
    async fn upstream_error_stops_resolution() {
        let (resolver, store) = resolver(FakeStore {
            fail_with: Some(500),
            ..FakeStore::default()
        });
        let err = resolver
            .resolve_one(EntityKind::Product, "42", None)
            .await
            .unwrap_err();

        assert!(matches!(err, ContentError::UpstreamError { status: 500, .. }));
        assert_eq!(store.queries().len(), 1);
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let (resolver, _) = resolver(FakeStore::default().with("products", widget()));
        let first = resolver
            .resolve_one(EntityKind::Product, "3", None)
            .await
            .unwrap();
        let second = resolver
            .resolve_one(EntityKind::Product, "3", None)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn candidate_filter_wins_over_extra() {
        let (resolver, store) = resolver(FakeStore::default().with("products", widget()));
        let extra = QuerySpec::new()
            .with_filters(
                Filters::new()
                    .eq("documentId", "something-else")
                    .with(&["title"], FilterOperator::ContainsI, "widget"),
            )
            .with_populate(Populate::list(["seo"]));

        resolver
            .resolve_one(EntityKind::Product, "abc123", Some(extra))
            .await
            .unwrap();

        let query = &store.queries()[0].1;
        assert!(query.contains("filters[documentId][$eq]=abc123"));
        assert!(!query.contains("something-else"));
        assert!(query.contains("filters[title][$containsi]=widget"));
        assert!(query.contains("populate[3]=seo"));
    }

    #[tokio::test]
    async fn resolve_many_merges_default_populate() {
        let (resolver, store) = resolver(FakeStore::default());
        let filters = Filters::new().with(&["product_category", "id"], FilterOperator::Eq, 7);
        let result = resolver
            .resolve_many(EntityKind::Product, filters, None)
            .await
            .unwrap();

        assert!(result.is_empty());
        let queries = store.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(
            queries[0].1,
            "populate[0]=product_category&populate[1]=product_version&populate[2]=productimages\
             &filters[product_category][id][$eq]=7"
        );
    }

    #[tokio::test]
    async fn resolve_many_returns_collection_as_is() {
        let (resolver, _) = resolver(
            FakeStore::default()
                .with("product-versions", json!({ "id": 1 }))
                .with("product-versions", json!({ "id": 2 })),
        );
        let result = resolver
            .resolve_many(EntityKind::Version, Filters::new(), None)
            .await
            .unwrap();
        assert_eq!(result.data, json!([{ "id": 1 }, { "id": 2 }]));
        assert_eq!(result.meta["pagination"]["total"], json!(2));
    }

    #[tokio::test]
    async fn find_by_document_id_skips_other_candidates() {
        let (resolver, store) = resolver(FakeStore::default().with("products", widget()));
        let err = resolver
            .find_by_document_id(EntityKind::Product, "blue-widget")
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::NotFound { .. }));
        assert_eq!(store.queries().len(), 1);
    }
}
