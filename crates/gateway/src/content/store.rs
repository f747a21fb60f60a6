//! Content store backends.
//!
//! Provides the trait the resolver and writer talk to, and the
//! reqwest-backed client for a Strapi-style REST API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response};
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use super::{ContentError, EntityEnvelope};

/// Content store backend trait.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// `GET /{collection}?{query}`.
    async fn find(&self, collection: &str, query: &str) -> Result<EntityEnvelope, ContentError>;

    /// `POST /{collection}` with `{data}`.
    async fn create(&self, collection: &str, data: Value) -> Result<EntityEnvelope, ContentError>;

    /// `PUT /{collection}/{id}` with `{data}`.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<EntityEnvelope, ContentError>;

    /// `DELETE /{collection}/{id}`.
    async fn delete(&self, collection: &str, id: &str) -> Result<EntityEnvelope, ContentError>;
}

/// Connection settings for [`StrapiClient`].
#[derive(Debug, Clone)]
pub struct StrapiSettings {
    /// REST base URL, e.g. `http://localhost:1337/api`.
    pub base_url: Url,

    /// Base URL uploaded files are served from.
    pub uploads_url: Url,

    /// Static bearer token, forwarded as-is.
    pub token: Option<String>,

    /// Total deadline for REST calls; connect and idle-read limit for
    /// upload streams.
    pub timeout: Duration,
}

/// HTTP client for a Strapi-style content store.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Clone)]
pub struct StrapiClient {
    client: reqwest::Client,
    base_url: String,
    uploads_url: Url,
    timeout: Duration,
}

impl StrapiClient {
    /// Build a client with the bearer token installed as a default header.
    pub fn new(settings: &StrapiSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = settings.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("STRAPI_TOKEN contains characters not allowed in a header")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        // The total deadline is set per REST request in `send`; upload
        // streams only get the connect and idle-read limits.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.timeout)
            .read_timeout(settings.timeout)
            .default_headers(headers)
            .build()
            .context("failed to build content store HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.as_str().trim_end_matches('/').to_string(),
            uploads_url: directory_url(&settings.uploads_url),
            timeout: settings.timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Location of an uploaded file, or `None` when `path` does not name a
    /// file inside the uploads directory.
    pub fn upload_url(&self, path: &str) -> Option<Url> {
        let root = self.uploads_url.join("uploads/").ok()?;
        let url = root.join(path).ok()?;
        let inside = url.origin() == root.origin()
            && url.path().starts_with(root.path())
            && url.path() != root.path()
            && url.query().is_none()
            && url.fragment().is_none();
        inside.then_some(url)
    }

    /// Open a streaming GET for an uploaded file.
    ///
    /// Only connect and idle-read limits apply, so large files are not cut
    /// off while they stream.
    pub async fn fetch_upload(&self, url: Url) -> Result<Response, ContentError> {
        debug!(%url, "fetching upload");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, %url, "content store upload request failed");
                ContentError::unavailable(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() != 404 {
                warn!(status = status.as_u16(), %url, body = %body, "content store upload error");
            }
            return Err(ContentError::UpstreamError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> Result<EntityEnvelope, ContentError> {
        let response = request.timeout(self.timeout).send().await.map_err(|e| {
            warn!(error = %e, resource, "content store request failed");
            ContentError::unavailable(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), resource, body = %body, "content store error");
            return Err(ContentError::UpstreamError {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ContentError::unavailable(&e))?;
        if bytes.is_empty() {
            return Ok(EntityEnvelope::empty());
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(error = %e, resource, "content store sent a malformed body");
            ContentError::MalformedResponse(e.to_string())
        })
    }
}

#[async_trait]
impl ContentStore for StrapiClient {
    async fn find(&self, collection: &str, query: &str) -> Result<EntityEnvelope, ContentError> {
        let url = if query.is_empty() {
            self.endpoint(collection)
        } else {
            format!("{}?{query}", self.endpoint(collection))
        };
        self.send(self.client.get(url), collection).await
    }

    async fn create(&self, collection: &str, data: Value) -> Result<EntityEnvelope, ContentError> {
        let request = self
            .client
            .post(self.endpoint(collection))
            .json(&json!({ "data": data }));
        self.send(request, collection).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<EntityEnvelope, ContentError> {
        let path = format!("{collection}/{}", urlencoding::encode(id));
        let request = self
            .client
            .put(self.endpoint(&path))
            .json(&json!({ "data": data }));
        self.send(request, &path).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<EntityEnvelope, ContentError> {
        let path = format!("{collection}/{}", urlencoding::encode(id));
        self.send(self.client.delete(self.endpoint(&path)), &path)
            .await
    }
}

/// Ensure the URL path ends in `/` so `join` appends instead of replacing.
fn directory_url(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
