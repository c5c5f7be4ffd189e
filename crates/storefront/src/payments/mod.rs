//! Payment gateways.
//!
//! Checkout only needs three things from a gateway: start a payment for an
//! order, find out whether it went through, and a reference to store on the
//! order. Each [`PaymentMethod`] maps to one [`PaymentGateway`].
//!
//! # Gateways
//!
//! - [`PaystackGateway`] - redirects to Paystack's hosted page and verifies
//!   the transaction when the customer comes back
//! - [`StubGateway`] - approves every payment immediately; used for Stripe,
//!   Flutterwave and for Paystack when no secret key is configured

mod paystack;
mod stub;

pub use paystack::PaystackGateway;
pub use stub::StubGateway;

use std::sync::Arc;

use async_trait::async_trait;
use oja_core::{PaymentMethod, Price};
use thiserror::Error;

use crate::config::PaystackConfig;

/// Errors talking to a payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway rejected the request.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// The amount cannot be expressed in minor units.
    #[error("invalid amount: {0}")]
    InvalidAmount(Price),
}

/// A payment to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub email: String,
    pub amount: Price,
    /// Our reference for the payment; the order number.
    pub reference: String,
    /// Where the gateway sends the customer afterwards.
    pub callback_url: String,
}

/// How a started payment continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentInit {
    /// Paid already; nothing more for the customer to do.
    Completed { reference: String },
    /// The customer must finish paying on the gateway's page.
    Redirect { url: String, reference: String },
}

/// Result of checking a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success { reference: String },
    Failed { reason: String },
}

/// A payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Start a payment.
    async fn initialize(&self, request: &PaymentRequest) -> Result<PaymentInit, PaymentError>;

    /// Look up the outcome of a payment by reference.
    async fn verify(&self, reference: &str) -> Result<PaymentOutcome, PaymentError>;
}

/// One gateway per payment method.
#[derive(Clone)]
pub struct Payments {
    paystack: Arc<dyn PaymentGateway>,
    stripe: Arc<dyn PaymentGateway>,
    flutterwave: Arc<dyn PaymentGateway>,
}

impl std::fmt::Debug for Payments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payments").finish_non_exhaustive()
    }
}

impl Payments {
    /// Gateways for the configured providers.
    ///
    /// # Errors
    ///
    /// Returns an error if the Paystack HTTP client cannot be built.
    pub fn new(paystack: Option<&PaystackConfig>) -> Result<Self, PaymentError> {
        let paystack: Arc<dyn PaymentGateway> = match paystack {
            Some(config) => Arc::new(PaystackGateway::new(config)?),
            None => {
                tracing::warn!("PAYSTACK_SECRET_KEY not set; card payments are approved without charging");
                Arc::new(StubGateway::new("paystack"))
            }
        };
        Ok(Self {
            paystack,
            stripe: Arc::new(StubGateway::new("stripe")),
            flutterwave: Arc::new(StubGateway::new("flutterwave")),
        })
    }

    /// Every method served by the stub gateway.
    #[must_use]
    pub fn stubbed() -> Self {
        Self {
            paystack: Arc::new(StubGateway::new("paystack")),
            stripe: Arc::new(StubGateway::new("stripe")),
            flutterwave: Arc::new(StubGateway::new("flutterwave")),
        }
    }

    /// Replace the gateway for one method.
    #[must_use]
    pub fn with_gateway(mut self, method: PaymentMethod, gateway: Arc<dyn PaymentGateway>) -> Self {
        match method {
            PaymentMethod::Paystack => self.paystack = gateway,
            PaymentMethod::Stripe => self.stripe = gateway,
            PaymentMethod::Flutterwave => self.flutterwave = gateway,
        }
        self
    }

    /// The gateway for a payment method.
    #[must_use]
    pub fn gateway(&self, method: PaymentMethod) -> &dyn PaymentGateway {
        match method {
            PaymentMethod::Paystack => self.paystack.as_ref(),
            PaymentMethod::Stripe => self.stripe.as_ref(),
            PaymentMethod::Flutterwave => self.flutterwave.as_ref(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use oja_core::CurrencyCode;
    use rust_decimal::Decimal;

    use super::*;

    struct Declining;

    #[async_trait]
    impl PaymentGateway for Declining {
        async fn initialize(&self, _request: &PaymentRequest) -> Result<PaymentInit, PaymentError> {
            Err(PaymentError::Gateway("card declined".to_string()))
        }

        async fn verify(&self, _reference: &str) -> Result<PaymentOutcome, PaymentError> {
            Ok(PaymentOutcome::Failed {
                reason: "card declined".to_string(),
            })
        }
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            email: "ada@example.com".to_string(),
            amount: Price::new(Decimal::new(34_750, 0), CurrencyCode::NGN),
            reference: "ORD-1720000000000".to_string(),
            callback_url: "http://localhost:3000/checkout/callback".to_string(),
        }
    }

    #[tokio::test]
    async fn test_without_paystack_key_payments_complete_immediately() {
        let payments = Payments::new(None).unwrap();
        let init = payments
            .gateway(PaymentMethod::Paystack)
            .initialize(&request())
            .await
            .unwrap();
        assert_eq!(
            init,
            PaymentInit::Completed {
                reference: "ORD-1720000000000".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_with_gateway_replaces_only_that_method() {
        let payments = Payments::stubbed().with_gateway(PaymentMethod::Stripe, Arc::new(Declining));

        assert!(
            payments
                .gateway(PaymentMethod::Stripe)
                .initialize(&request())
                .await
                .is_err()
        );
        assert!(
            payments
                .gateway(PaymentMethod::Flutterwave)
                .initialize(&request())
                .await
                .is_ok()
        );
    }
}
