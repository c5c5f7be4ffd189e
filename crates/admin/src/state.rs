//! Application state shared across handlers.

use std::sync::Arc;

use oja_backend::{Backend, BackendError};

use crate::config::AdminConfig;

/// Application state shared across all handlers.
///
/// Holds two backend clients: the service role client for catalog and
/// order management, and a public-key client used only to sign admins in.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    backend: Backend,
    auth: Backend,
}

impl AppState {
    /// Create a new application state from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: AdminConfig) -> Result<Self, BackendError> {
        let backend = Backend::new(&config.backend)?;
        let auth = Backend::new(&config.auth_backend)?;
        Ok(Self::with_parts(config, backend, auth))
    }

    /// Assemble state from already-built clients.
    #[must_use]
    pub fn with_parts(config: AdminConfig, backend: Backend, auth: Backend) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                auth,
            }),
        }
    }

    /// Get a reference to the admin configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Service role backend client (HIGH PRIVILEGE).
    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.inner.backend
    }

    /// Public-key backend client for the auth API.
    #[must_use]
    pub fn auth(&self) -> &Backend {
        &self.inner.auth
    }
}
