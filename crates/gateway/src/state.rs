//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::content::{ContentStore, ContentWriter, Resolver, StrapiClient};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Loaded configuration.
    config: Config,

    /// Content store client, also used directly for upload streaming.
    strapi: StrapiClient,

    /// Identifier and collection lookups.
    resolver: Resolver,

    /// Write-side pass-through.
    writer: ContentWriter,
}

impl AppState {
    /// Build the content store client and the services on top of it.
    pub fn new(config: &Config) -> Result<Self> {
        let strapi = StrapiClient::new(&config.strapi_settings())
            .context("failed to create content store client")?;
        let store: Arc<dyn ContentStore> = Arc::new(strapi.clone());

        info!(
            strapi_url = %config.strapi_url,
            token = config.strapi_token.is_some(),
            "content store client ready"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config: config.clone(),
                strapi,
                resolver: Resolver::new(store.clone()),
                writer: ContentWriter::new(store),
            }),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the content store client.
    pub fn strapi(&self) -> &StrapiClient {
        &self.inner.strapi
    }

    /// Get the resolver.
    pub fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }

    /// Get the writer.
    pub fn writer(&self) -> &ContentWriter {
        &self.inner.writer
    }
}
