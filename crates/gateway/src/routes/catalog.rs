//! Catalog API routes.
//!
//! Categories, products, versions and product images, backed by the
//! resolver for reads and the writer for writes.

use axum::{
    Json, Router,
    extract::{Path, RawQuery, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{MethodRouter, get},
};
use serde_json::{Map, Value};

use crate::content::{EntityEnvelope, EntityKind};
use crate::error::{AppError, AppResult};
use crate::query::{self, FilterOperator, Filters, QueryError, QuerySpec};
use crate::state::AppState;

/// Create the catalog router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(list_categories).merge(create_route(EntityKind::Category)),
        )
        .route("/categories/{id}", entry_routes(EntityKind::Category))
        .route(
            "/products",
            get(list_products).merge(create_route(EntityKind::Product)),
        )
        .route("/products/{id}", entry_routes(EntityKind::Product))
        .route(
            "/versions",
            get(list_versions).merge(create_route(EntityKind::Version)),
        )
        .route("/versions/{id}", entry_routes(EntityKind::Version))
        .route("/product-images/{document_id}", get(show_product_image))
}

// -------------------------------------------------------------------------
// Client query handling
// -------------------------------------------------------------------------

/// A client query split into route parameters and content store parameters.
struct ClientQuery {
    spec: QuerySpec,
    params: Map<String, Value>,
}

impl ClientQuery {
    /// Parse `raw`, pulling `route_params` out before the rest is read as a
    /// [`QuerySpec`].
    fn parse(raw: Option<&str>, route_params: &[&str]) -> AppResult<Self> {
        let mut all = match query::parse(raw.unwrap_or_default())? {
            Value::Object(map) => map,
            _ => return Err(QueryError::invalid("query", "expected named parameters").into()),
        };

        let mut params = Map::new();
        for name in route_params {
            if let Some(value) = all.remove(*name) {
                params.insert((*name).to_string(), value);
            }
        }

        let spec = QuerySpec::from_value(Value::Object(all))?;
        Ok(Self { spec, params })
    }

    /// Take a single-valued route parameter; empty counts as absent.
    fn take(&mut self, name: &str) -> AppResult<Option<String>> {
        match self.params.remove(name) {
            None => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(AppError::BadRequest(format!(
                "`{name}` must be a single value"
            ))),
        }
    }
}

fn payload(body: Result<Json<Value>, JsonRejection>) -> AppResult<Value> {
    let Json(data) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    if !data.is_object() {
        return Err(AppError::BadRequest(
            "request body must be a JSON object".to_string(),
        ));
    }
    Ok(data)
}

// -------------------------------------------------------------------------
// Collections
// -------------------------------------------------------------------------

async fn list_categories(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> AppResult<Json<EntityEnvelope>> {
    let query = ClientQuery::parse(raw.as_deref(), &[])?;
    let categories = state
        .resolver()
        .resolve_many(EntityKind::Category, Filters::new(), Some(query.spec))
        .await?;
    Ok(Json(categories))
}

/// `GET /products?category=X` narrows to one category.
async fn list_products(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> AppResult<Json<EntityEnvelope>> {
    let mut query = ClientQuery::parse(raw.as_deref(), &["category"])?;

    let mut filters = Filters::new();
    if let Some(category) = query.take("category")? {
        filters = filters.with(&["product_category", "id"], FilterOperator::Eq, category);
    }

    let products = state
        .resolver()
        .resolve_many(EntityKind::Product, filters, Some(query.spec))
        .await?;
    Ok(Json(products))
}

/// `GET /versions?product=X`: the product is resolved first so any of its
/// identifiers works and a missing product is a 404.
async fn list_versions(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> AppResult<Json<EntityEnvelope>> {
    let mut query = ClientQuery::parse(raw.as_deref(), &["product"])?;
    let Some(product) = query.take("product")? else {
        return Err(AppError::BadRequest(
            "product query parameter is required".to_string(),
        ));
    };

    let product = state
        .resolver()
        .resolve_one(EntityKind::Product, &product, None)
        .await?;
    let product_id = product
        .data
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow::anyhow!("resolved product has no numeric id"))?;

    let filters = Filters::new().with(&["product", "id"], FilterOperator::Eq, product_id);
    let versions = state
        .resolver()
        .resolve_many(EntityKind::Version, filters, Some(query.spec))
        .await?;
    Ok(Json(versions))
}

// -------------------------------------------------------------------------
// Single entries
// -------------------------------------------------------------------------

fn entry_routes(kind: EntityKind) -> MethodRouter<AppState> {
    get(
        move |State(state): State<AppState>, Path(id): Path<String>, RawQuery(raw): RawQuery| async move {
            show(state, kind, id, raw).await
        },
    )
    .put(
        move |State(state): State<AppState>,
              Path(id): Path<String>,
              body: Result<Json<Value>, JsonRejection>| async move {
            update(state, kind, id, body).await
        },
    )
    .delete(
        move |State(state): State<AppState>, Path(id): Path<String>| async move {
            remove(state, kind, id).await
        },
    )
}

fn create_route(kind: EntityKind) -> MethodRouter<AppState> {
    axum::routing::post(
        move |State(state): State<AppState>, body: Result<Json<Value>, JsonRejection>| async move {
            create(state, kind, body).await
        },
    )
}

async fn show(
    state: AppState,
    kind: EntityKind,
    id: String,
    raw: Option<String>,
) -> AppResult<Json<EntityEnvelope>> {
    let query = ClientQuery::parse(raw.as_deref(), &[])?;
    let entry = state
        .resolver()
        .resolve_one(kind, &id, Some(query.spec))
        .await?;
    Ok(Json(entry))
}

async fn show_product_image(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> AppResult<Json<EntityEnvelope>> {
    let image = state
        .resolver()
        .find_by_document_id(EntityKind::ProductImage, &document_id)
        .await?;
    Ok(Json(image))
}

async fn create(
    state: AppState,
    kind: EntityKind,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<(StatusCode, Json<EntityEnvelope>)> {
    let data = payload(body)?;
    let created = state.writer().create(kind, data).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update(
    state: AppState,
    kind: EntityKind,
    id: String,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<EntityEnvelope>> {
    let data = payload(body)?;
    let updated = state.writer().update(kind, &id, data).await?;
    Ok(Json(updated))
}

async fn remove(state: AppState, kind: EntityKind, id: String) -> AppResult<Json<EntityEnvelope>> {
    let deleted = state.writer().delete(kind, &id).await?;
    Ok(Json(deleted))
}
