#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Every [`TestApp`] runs the real gateway router against its own
//! [`StubContentStore`], so tests can run in parallel and assert on the
//! exact requests the gateway made upstream.

#![allow(dead_code)]

use std::collections::HashMap;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use catalog_gateway::config::Config;
use catalog_gateway::state::AppState;
use catalog_test_utils::StubContentStore;

pub const TOKEN: &str = "test-token";

/// Test application wrapper using the real gateway routes and state.
pub struct TestApp {
    router: Router,
    pub store: StubContentStore,
}

impl TestApp {
    /// Gateway in production mode with the standard catalog seeded.
    pub async fn new() -> Self {
        Self::with_env(&[]).await
    }

    /// Gateway with extra environment variables on top of the defaults.
    pub async fn with_env(vars: &[(&str, &str)]) -> Self {
        let store = StubContentStore::start().await;
        seed_catalog(&store);

        let mut env: HashMap<String, String> = HashMap::from([
            ("STRAPI_URL".to_string(), store.base_url()),
            ("STRAPI_TOKEN".to_string(), TOKEN.to_string()),
        ]);
        for (name, value) in vars {
            env.insert(name.to_string(), value.to_string());
        }

        let config = Config::from_lookup(|name| env.get(name).cloned()).expect("test config");
        let state = AppState::new(&config).expect("Failed to initialize AppState");

        Self {
            router: catalog_gateway::app(state),
            store,
        }
    }

    /// Send a request through the router.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// `GET uri`.
    pub async fn get(&self, uri: &str) -> Response {
        self.request(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Send `body` as JSON.
    pub async fn send_json(&self, method: Method, uri: &str, body: &Value) -> Response {
        self.request(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// `DELETE uri`.
    pub async fn delete(&self, uri: &str) -> Response {
        self.request(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

/// Collect a response body.
pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Two categories, two products, three versions and one product image.
pub fn seed_catalog(store: &StubContentStore) {
    store.insert(
        "product-categories",
        json!({ "id": 1, "documentId": "cat1doc", "slug": "power-tools", "title": "Power Tools" }),
    );
    store.insert(
        "product-categories",
        json!({ "id": 42, "documentId": "cat42doc", "slug": "garden", "title": "Garden" }),
    );

    store.insert(
        "products",
        json!({
            "id": 10,
            "documentId": "abc123xyz",
            "slug": "drill",
            "title": "Drill",
            "product_category": { "id": 1 }
        }),
    );
    store.insert(
        "products",
        json!({
            "id": 11,
            "documentId": "mower11doc",
            "slug": "mower",
            "title": "Mower",
            "product_category": { "id": 42 }
        }),
    );

    store.insert(
        "product-versions",
        json!({ "id": 100, "documentId": "v100doc", "slug": "drill-v1", "product": { "id": 10 } }),
    );
    store.insert(
        "product-versions",
        json!({ "id": 101, "documentId": "v101doc", "slug": "drill-v2", "product": { "id": 10 } }),
    );
    store.insert(
        "product-versions",
        json!({ "id": 102, "documentId": "v102doc", "slug": "mower-v1", "product": { "id": 11 } }),
    );

    store.insert(
        "product-images",
        json!({ "id": 500, "documentId": "img500doc", "file": { "url": "/uploads/drill.png" } }),
    );
}
