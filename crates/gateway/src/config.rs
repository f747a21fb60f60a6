//! Configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::content::StrapiSettings;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 5000).
    pub port: u16,

    /// Content store REST base URL (default: http://localhost:1337/api).
    pub strapi_url: Url,

    /// Static bearer token forwarded to the content store.
    pub strapi_token: Option<String>,

    /// Base URL for `/uploads/*` (default: origin of `strapi_url`).
    pub strapi_uploads_url: Url,

    /// Per-request content store timeout (default: 10s).
    pub strapi_timeout: Duration,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Include internal error details in responses (`APP_ENV=development`).
    pub expose_error_details: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = lookup("PORT")
            .unwrap_or_else(|| "5000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let strapi_url = lookup("STRAPI_URL")
            .unwrap_or_else(|| "http://localhost:1337/api".to_string());
        let strapi_url = Url::parse(&strapi_url).context("STRAPI_URL must be an absolute URL")?;

        let strapi_token = lookup("STRAPI_TOKEN").filter(|t| !t.is_empty());

        let strapi_uploads_url = match lookup("STRAPI_UPLOADS_URL") {
            Some(url) => Url::parse(&url).context("STRAPI_UPLOADS_URL must be an absolute URL")?,
            None => origin_of(&strapi_url),
        };

        let timeout_secs: u64 = lookup("STRAPI_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("STRAPI_TIMEOUT_SECS must be a whole number of seconds")?;
        if timeout_secs == 0 {
            anyhow::bail!("STRAPI_TIMEOUT_SECS must be greater than zero");
        }

        let cors_allowed_origins = lookup("CORS_ORIGIN")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| vec!["*".to_string()]);

        let expose_error_details = lookup("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("development"))
            .unwrap_or(false);

        Ok(Self {
            port,
            strapi_url,
            strapi_token,
            strapi_uploads_url,
            strapi_timeout: Duration::from_secs(timeout_secs),
            cors_allowed_origins,
            expose_error_details,
        })
    }

    /// Content store connection settings.
    pub fn strapi_settings(&self) -> StrapiSettings {
        StrapiSettings {
            base_url: self.strapi_url.clone(),
            uploads_url: self.strapi_uploads_url.clone(),
            token: self.strapi_token.clone(),
            timeout: self.strapi_timeout,
        }
    }
}

/// `http://host:1337/api` → `http://host:1337/`.
fn origin_of(url: &Url) -> Url {
    let mut origin = url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
}
