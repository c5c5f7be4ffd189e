//! Application state shared across handlers.

use std::sync::Arc;

use oja_backend::{Backend, BackendError};
use oja_core::checkout::PricingPolicy;
use thiserror::Error;

use crate::config::StorefrontConfig;
use crate::payments::{PaymentError, Payments};

/// Error building application state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("backend client: {0}")]
    Backend(#[from] BackendError),
    #[error("payment gateway: {0}")]
    Payments(#[from] PaymentError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the backend client and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: Backend,
    payments: Payments,
}

impl AppState {
    /// Create a new application state from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let backend = Backend::new(&config.backend)?;
        let payments = Payments::new(config.paystack.as_ref())?;
        Ok(Self::with_parts(config, backend, payments))
    }

    /// Assemble state from already-built parts.
    #[must_use]
    pub fn with_parts(config: StorefrontConfig, backend: Backend, payments: Payments) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                payments,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backend client (anon key).
    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.inner.backend
    }

    /// Get a reference to the payment gateways.
    #[must_use]
    pub fn payments(&self) -> &Payments {
        &self.inner.payments
    }

    /// Tax and shipping rules.
    #[must_use]
    pub fn pricing(&self) -> &PricingPolicy {
        &self.inner.config.pricing
    }
}
