//! Paystack hosted checkout.
//!
//! `POST /transaction/initialize` returns an `authorization_url` the customer
//! is sent to; Paystack redirects back to the callback URL with the
//! reference, which is then checked with `GET /transaction/verify/{ref}`.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use super::{PaymentError, PaymentGateway, PaymentInit, PaymentOutcome, PaymentRequest};
use crate::config::PaystackConfig;

/// Paystack response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Authorization {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct Transaction {
    status: String,
    reference: String,
    #[serde(default)]
    gateway_response: Option<String>,
}

/// Paystack gateway.
#[derive(Debug, Clone)]
pub struct PaystackGateway {
    client: reqwest::Client,
    base_url: String,
}

impl PaystackGateway {
    /// Create a new Paystack client.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &PaystackConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth_value = HeaderValue::from_str(&auth_value)
            .map_err(|e| PaymentError::Gateway(format!("Invalid secret key format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn read<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        let text = response.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(status = %status, error = %e, "Unexpected Paystack response");
            PaymentError::Gateway(format!("unexpected response ({status})"))
        })?;

        if !status.is_success() || !envelope.status {
            return Err(PaymentError::Gateway(envelope.message));
        }
        envelope
            .data
            .ok_or_else(|| PaymentError::Gateway("response without data".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    #[instrument(skip(self, request), fields(reference = %request.reference, amount = %request.amount))]
    async fn initialize(&self, request: &PaymentRequest) -> Result<PaymentInit, PaymentError> {
        let minor_units = request
            .amount
            .to_minor_units()
            .filter(|units| *units > 0)
            .ok_or(PaymentError::InvalidAmount(request.amount))?;

        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .json(&json!({
                "email": request.email,
                "amount": minor_units,
                "currency": request.amount.currency_code.code(),
                "reference": request.reference,
                "callback_url": request.callback_url,
            }))
            .send()
            .await?;

        let authorization: Authorization = Self::read(response).await?;
        Ok(PaymentInit::Redirect {
            url: authorization.authorization_url,
            reference: authorization.reference,
        })
    }

    #[instrument(skip(self))]
    async fn verify(&self, reference: &str) -> Result<PaymentOutcome, PaymentError> {
        let response = self
            .client
            .get(format!(
                "{}/transaction/verify/{}",
                self.base_url,
                urlencoding::encode(reference)
            ))
            .send()
            .await?;

        let transaction: Transaction = Self::read(response).await?;
        if transaction.status == "success" {
            Ok(PaymentOutcome::Success {
                reference: transaction.reference,
            })
        } else {
            Ok(PaymentOutcome::Failed {
                reason: transaction
                    .gateway_response
                    .unwrap_or(transaction.status),
            })
        }
    }
}
