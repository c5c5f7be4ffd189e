//! Client for the hosted backend-as-a-service behind Oja.
//!
//! The backend provides three HTTP APIs under one base URL:
//!
//! - `/rest/v1` - relational tables, queried through [`Query`]
//! - `/auth/v1` - email/password accounts and sessions
//! - `/storage/v1` - public object storage for product images
//!
//! The backend is the source of truth; nothing is synced locally. Catalog
//! reads are cached in memory with `moka` (5 minute TTL) and invalidated on
//! every catalog write.
//!
//! # Example
//!
//! ```rust,ignore
//! use oja_backend::{Backend, BackendConfig};
//!
//! let backend = Backend::new(&config.backend)?;
//!
//! // Shop listing
//! let page = backend.get_products(1, 12, &filters).await?;
//!
//! // Requests on behalf of a signed-in customer
//! let orders = backend.as_user(&access_token).get_user_orders(user_id).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

mod auth;
mod cache;
mod catalog;
mod contact;
mod emails;
mod error;
mod orders;
mod profiles;
mod rest;
mod storage;

pub use auth::{AuthSession, AuthUser, SignUpOutcome};
pub use emails::{QueuedEmail, order_confirmation_email};
pub use error::{ApiErrorBody, BackendError};
pub use rest::Query;
pub use storage::object_path;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use url::Url;

use cache::CacheValue;

/// Connection settings for the backend.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://abc.backend.example.com`.
    pub url: Url,
    /// Project API key. The anon key for the storefront, the service role
    /// key for admin tooling.
    pub api_key: SecretString,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BackendConfig {
    /// Config with the default 15 second timeout.
    #[must_use]
    pub const fn new(url: Url, api_key: SecretString) -> Self {
        Self {
            url,
            api_key,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Backend client.
///
/// Cheap to clone; clones share the HTTP connection pool and catalog cache.
#[derive(Clone)]
pub struct Backend {
    inner: Arc<BackendInner>,
    /// Access token of the user the requests are made for. Without one,
    /// requests authenticate with the project API key.
    user_token: Option<Arc<SecretString>>,
}

struct BackendInner {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    cache: Cache<String, CacheValue>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("base_url", &self.inner.base_url)
            .field("as_user", &self.user_token.is_some())
            .finish_non_exhaustive()
    }
}

impl Backend {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("oja/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendInner {
                client,
                base_url: config.url.as_str().trim_end_matches('/').to_string(),
                api_key: config.api_key.clone(),
                cache,
            }),
            user_token: None,
        })
    }

    /// A client that makes requests as the user owning `access_token`, so
    /// row-level policies apply to them.
    #[must_use]
    pub fn as_user(&self, access_token: &str) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            user_token: Some(Arc::new(SecretString::from(access_token.to_string()))),
        }
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    fn bearer(&self) -> &str {
        self.user_token
            .as_deref()
            .unwrap_or(&self.inner.api_key)
            .expose_secret()
    }

    /// Start a request with the API key and bearer token attached.
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.request_as(method, path, self.bearer())
    }

    /// Start a request authenticated with an explicit bearer token.
    fn request_as(
        &self,
        method: reqwest::Method,
        path: &str,
        bearer: &str,
    ) -> reqwest::RequestBuilder {
        self.inner
            .client
            .request(method, self.endpoint(path))
            .header("apikey", self.inner.api_key.expose_secret())
            .bearer_auth(bearer)
    }

    /// Send a request and return the response headers and body.
    ///
    /// Non-success statuses become [`BackendError::Api`] (or
    /// [`BackendError::RateLimited`] for 429).
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(HeaderMap, String), BackendError> {
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

        let headers = response.headers().clone();
        // Read as text first so failures can be logged with the body.
        let text = response.text().await?;

        if !status.is_success() {
            let body = error::ApiErrorBody::parse(&text);
            if status.is_server_error() {
                tracing::error!(
                    status = %status,
                    body = %text.chars().take(500).collect::<String>(),
                    "Backend returned server error"
                );
            } else {
                tracing::debug!(status = %status, error = %body.describe(), "Backend rejected request");
            }
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok((headers, text))
    }

    /// Decode a JSON body, logging the body when it does not parse.
    fn decode<T: DeserializeOwned>(text: &str) -> Result<T, BackendError> {
        serde_json::from_str(text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            BackendError::Parse(e)
        })
    }

    // =========================================================================
    // Cache Methods
    // =========================================================================

    /// Drop every cached catalog read.
    pub fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn backend() -> Backend {
        let config = BackendConfig::new(
            "https://project.backend.test/".parse().unwrap(),
            SecretString::from("anon-key"),
        );
        Backend::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let backend = backend();
        assert_eq!(backend.base_url(), "https://project.backend.test");
        assert_eq!(
            backend.endpoint("/rest/v1/products"),
            "https://project.backend.test/rest/v1/products"
        );
    }

    #[test]
    fn test_as_user_swaps_bearer_only() {
        let backend = backend();
        assert_eq!(backend.bearer(), "anon-key");
        let user = backend.as_user("user-jwt");
        assert_eq!(user.bearer(), "user-jwt");
        assert!(Arc::ptr_eq(&backend.inner, &user.inner));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = BackendConfig::new(
            "https://project.backend.test".parse().unwrap(),
            SecretString::from("super-secret-service-key"),
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-service-key"));
        assert!(debug.contains("[REDACTED]"));
    }
}
