//! Catalog gateway test utilities.
//!
//! [`StubContentStore`] is a small in-process HTTP server speaking enough of
//! the Strapi REST dialect for integration tests: collection lookups with
//! `$eq` filters, writes, and uploaded files. Every request it receives is
//! recorded so tests can assert on exactly what the gateway sent.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio_stream::wrappers::ReceiverStream;

/// A request as the stub store saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    /// Path relative to the `/api/` prefix, e.g. `products` or `products/abc`.
    pub fn resource(&self) -> &str {
        self.path.trim_start_matches("/api/")
    }
}

#[derive(Default)]
struct Shared {
    entities: Mutex<HashMap<String, Vec<Value>>>,
    failures: Mutex<HashMap<String, (u16, String)>>,
    uploads: Mutex<HashMap<String, (String, Vec<u8>)>>,
    slow_uploads: Mutex<HashMap<String, SlowUpload>>,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<RecordedRequest>>,
    next_id: AtomicI64,
}

#[derive(Clone)]
struct SlowUpload {
    content_type: String,
    chunks: Vec<Vec<u8>>,
    gap: Duration,
}

/// In-process Strapi stand-in bound to an ephemeral local port.
pub struct StubContentStore {
    addr: SocketAddr,
    shared: Arc<Shared>,
    server: tokio::task::JoinHandle<()>,
}

impl StubContentStore {
    /// Bind to `127.0.0.1:0` and start serving in the background.
    pub async fn start() -> Self {
        let shared = Arc::new(Shared {
            next_id: AtomicI64::new(1000),
            ..Shared::default()
        });

        let router = Router::new()
            .route("/api/{collection}", get(find).post(create))
            .route("/api/{collection}/{id}", axum::routing::put(update).delete(remove))
            .route("/uploads/{*path}", get(upload))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub content store");
        let addr = listener.local_addr().expect("stub content store address");
        let server = tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        Self {
            addr,
            shared,
            server,
        }
    }

    /// REST base URL, `http://127.0.0.1:{port}/api`.
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Server origin, `http://127.0.0.1:{port}`.
    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Add an entity to a collection.
    pub fn insert(&self, collection: &str, entity: Value) {
        self.shared
            .entities
            .lock()
            .entry(collection.to_string())
            .or_default()
            .push(entity);
    }

    /// Current contents of a collection.
    pub fn entities(&self, collection: &str) -> Vec<Value> {
        self.shared
            .entities
            .lock()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Answer every request to `collection` with `status` and `body`.
    pub fn fail_with(&self, collection: &str, status: u16, body: &str) {
        self.shared
            .failures
            .lock()
            .insert(collection.to_string(), (status, body.to_string()));
    }

    /// Serve `bytes` at `/uploads/{path}`.
    pub fn add_upload(&self, path: &str, content_type: &str, bytes: &[u8]) {
        self.shared.uploads.lock().insert(
            path.to_string(),
            (content_type.to_string(), bytes.to_vec()),
        );
    }

    /// Serve `chunks` at `/uploads/{path}`, pausing `gap` before each one.
    pub fn add_slow_upload(&self, path: &str, content_type: &str, chunks: &[&[u8]], gap: Duration) {
        self.shared.slow_uploads.lock().insert(
            path.to_string(),
            SlowUpload {
                content_type: content_type.to_string(),
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
                gap,
            },
        );
    }

    /// Hold every GET lookup against `collection` for `delay` before
    /// answering.
    pub fn delay_lookups(&self, collection: &str, delay: Duration) {
        self.shared
            .delays
            .lock()
            .insert(collection.to_string(), delay);
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared.requests.lock().clone()
    }

    /// Raw query strings of the GET lookups against `collection`.
    pub fn queries(&self, collection: &str) -> Vec<String> {
        let path = format!("/api/{collection}");
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::GET && r.path == path)
            .map(|r| r.query.unwrap_or_default())
            .collect()
    }

    /// Forget recorded requests.
    pub fn clear_requests(&self) {
        self.shared.requests.lock().clear();
    }
}

impl Drop for StubContentStore {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// -------------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------------

fn record(
    shared: &Shared,
    method: Method,
    path: String,
    query: Option<String>,
    headers: &HeaderMap,
    body: &Bytes,
) {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = serde_json::from_slice(body).ok();
    shared.requests.lock().push(RecordedRequest {
        method,
        path,
        query,
        authorization,
        body,
    });
}

fn failure(shared: &Shared, collection: &str) -> Option<Response> {
    let (status, body) = shared.failures.lock().get(collection).cloned()?;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Some((status, body).into_response())
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "data": null,
            "error": { "status": 404, "name": "NotFoundError", "message": "Not Found" }
        })),
    )
        .into_response()
}

async fn find(
    State(shared): State<Arc<Shared>>,
    Path(collection): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    record(
        &shared,
        Method::GET,
        format!("/api/{collection}"),
        query.clone(),
        &headers,
        &Bytes::new(),
    );
    let delay = shared.delays.lock().get(&collection).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(response) = failure(&shared, &collection) {
        return response;
    }

    let conditions = eq_conditions(query.as_deref().unwrap_or_default());
    let data: Vec<Value> = shared
        .entities
        .lock()
        .get(&collection)
        .map(|entities| {
            entities
                .iter()
                .filter(|e| {
                    conditions
                        .iter()
                        .all(|(path, expected)| matches(e, path, expected))
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let total = data.len();
    Json(json!({
        "data": data,
        "meta": { "pagination": { "page": 1, "pageSize": 25, "pageCount": 1, "total": total } }
    }))
    .into_response()
}

async fn create(
    State(shared): State<Arc<Shared>>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    record(
        &shared,
        Method::POST,
        format!("/api/{collection}"),
        None,
        &headers,
        &body,
    );
    if let Some(response) = failure(&shared, &collection) {
        return response;
    }

    let Some(Value::Object(mut data)) = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|mut v| v.get_mut("data").map(Value::take))
    else {
        return (StatusCode::BAD_REQUEST, "missing data").into_response();
    };

    let id = shared.next_id.fetch_add(1, Ordering::SeqCst);
    data.insert("id".to_string(), json!(id));
    data.insert("documentId".to_string(), json!(format!("doc{id}")));
    let entity = Value::Object(data);
    shared
        .entities
        .lock()
        .entry(collection)
        .or_default()
        .push(entity.clone());

    Json(json!({ "data": entity, "meta": {} })).into_response()
}

async fn update(
    State(shared): State<Arc<Shared>>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    record(
        &shared,
        Method::PUT,
        format!("/api/{collection}/{id}"),
        None,
        &headers,
        &body,
    );
    if let Some(response) = failure(&shared, &collection) {
        return response;
    }

    let changes = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|mut v| v.get_mut("data").map(Value::take));
    let Some(Value::Object(changes)) = changes else {
        return (StatusCode::BAD_REQUEST, "missing data").into_response();
    };

    let mut entities = shared.entities.lock();
    let Some(entity) = entities
        .get_mut(&collection)
        .and_then(|list| list.iter_mut().find(|e| has_id(e, &id)))
    else {
        return not_found();
    };
    if let Value::Object(fields) = &mut *entity {
        for (key, value) in changes {
            fields.insert(key, value);
        }
    }

    Json(json!({ "data": entity.clone(), "meta": {} })).into_response()
}

async fn remove(
    State(shared): State<Arc<Shared>>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    record(
        &shared,
        Method::DELETE,
        format!("/api/{collection}/{id}"),
        None,
        &headers,
        &Bytes::new(),
    );
    if let Some(response) = failure(&shared, &collection) {
        return response;
    }

    let mut entities = shared.entities.lock();
    let Some(list) = entities.get_mut(&collection) else {
        return not_found();
    };
    let before = list.len();
    list.retain(|e| !has_id(e, &id));
    if list.len() == before {
        return not_found();
    }

    StatusCode::NO_CONTENT.into_response()
}

async fn upload(
    State(shared): State<Arc<Shared>>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    record(
        &shared,
        Method::GET,
        format!("/uploads/{path}"),
        None,
        &headers,
        &Bytes::new(),
    );

    let slow = shared.slow_uploads.lock().get(&path).cloned();
    if let Some(slow) = slow {
        return slow_body(slow);
    }

    match shared.uploads.lock().get(&path).cloned() {
        Some((content_type, bytes)) => {
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

fn slow_body(upload: SlowUpload) -> Response {
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, std::io::Error>>(1);
    tokio::spawn(async move {
        for chunk in upload.chunks {
            tokio::time::sleep(upload.gap).await;
            if tx.send(Ok(Bytes::from(chunk))).await.is_err() {
                return;
            }
        }
    });

    (
        [(header::CONTENT_TYPE, upload.content_type)],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}

// -------------------------------------------------------------------------
// Filter evaluation
// -------------------------------------------------------------------------

fn has_id(entity: &Value, id: &str) -> bool {
    entity.get("documentId").and_then(Value::as_str) == Some(id)
        || entity.get("id").map(|v| v.to_string()).as_deref() == Some(id)
}

/// Pull `filters[a][b][$eq]=v` pairs out of a query string.
///
/// Other operators are ignored, so they never narrow the result.
fn eq_conditions(query: &str) -> Vec<(Vec<String>, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode(key);
            let rest = key.strip_prefix("filters[")?.strip_suffix(']')?;
            let mut path: Vec<String> = rest.split("][").map(str::to_string).collect();
            if path.last().map(String::as_str) != Some("$eq") {
                return None;
            }
            path.pop();
            Some((path, decode(value)))
        })
        .collect()
}

fn decode(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .map(|s| s.into_owned())
        .unwrap_or(raw)
}

fn matches(value: &Value, path: &[String], expected: &str) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|item| matches(item, path, expected)),
        Value::Object(map) => match path.split_first() {
            Some((head, tail)) => map
                .get(head)
                .is_some_and(|next| matches(next, tail, expected)),
            None => false,
        },
        Value::String(s) => path.is_empty() && s == expected,
        Value::Number(n) => path.is_empty() && n.to_string() == expected,
        Value::Bool(b) => path.is_empty() && b.to_string() == expected,
        Value::Null => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_conditions_decode_nested_paths() {
        let conditions =
            eq_conditions("populate=%2A&filters[product][id][$eq]=7&filters[slug][$eq]=big%20saw");
        assert_eq!(
            conditions,
            vec![
                (vec!["product".to_string(), "id".to_string()], "7".to_string()),
                (vec!["slug".to_string()], "big saw".to_string()),
            ]
        );
    }

    #[test]
    fn matches_walks_relations() {
        let entity = json!({ "id": 5, "product": { "id": 7 }, "tags": [{ "name": "a" }, { "name": "b" }] });
        assert!(matches(&entity, &["id".to_string()], "5"));
        assert!(matches(&entity, &["product".to_string(), "id".to_string()], "7"));
        assert!(matches(&entity, &["tags".to_string(), "name".to_string()], "b"));
        assert!(!matches(&entity, &["product".to_string(), "id".to_string()], "8"));
    }

    #[test]
    fn has_id_accepts_both_identifiers() {
        let entity = json!({ "id": 5, "documentId": "abc" });
        assert!(has_id(&entity, "5"));
        assert!(has_id(&entity, "abc"));
        assert!(!has_id(&entity, "6"));
    }
}
