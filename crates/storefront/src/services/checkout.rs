//! Checkout flow: cart snapshot to paid order.
//!
//! 1. Build the order payload from the cart and the submitted details.
//! 2. Create the order (and its items) in the backend.
//! 3. Start a payment with the order number as reference.
//! 4. Once paid, mark the order paid and queue the confirmation email.
//!
//! Clearing the cart and remembering a redirected payment are left to the
//! route handlers, which own the session.

use chrono::{DateTime, Utc};
use oja_backend::{Backend, BackendError};
use oja_core::cart::Cart;
use oja_core::checkout::{CheckoutDetails, CheckoutError, PricingPolicy};
use oja_core::order::{NewOrder, Order};
use oja_core::{OrderId, PaymentStatus, UserId};
use thiserror::Error;
use tracing::instrument;

use crate::models::PendingCheckout;
use crate::payments::{PaymentError, PaymentInit, PaymentOutcome, PaymentRequest, Payments};

/// Why a checkout did not go through.
#[derive(Debug, Error)]
pub enum CheckoutFlowError {
    /// The cart or the submitted details were rejected.
    #[error(transparent)]
    Invalid(#[from] CheckoutError),

    /// The order could not be created or updated.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The gateway could not be reached or refused to start the payment.
    #[error("payment for order {order_id} failed: {source}")]
    Payment {
        order_id: OrderId,
        #[source]
        source: PaymentError,
    },

    /// The customer did not complete the payment.
    #[error("payment for order {order_id} declined: {reason}")]
    Declined { order_id: OrderId, reason: String },

    /// The callback reference does not belong to the pending order.
    #[error("payment reference {0} does not match the pending order")]
    ReferenceMismatch(String),
}

impl CheckoutFlowError {
    /// Short code used in `?error=` redirects.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Invalid(err) => err.code(),
            Self::Backend(_) => "order_failed",
            Self::Payment { .. } => "payment_failed",
            Self::Declined { .. } => "payment_declined",
            Self::ReferenceMismatch(_) => "payment_reference",
        }
    }

    /// Whether the order is still waiting on its payment, so the customer
    /// can retry the callback.
    #[must_use]
    pub const fn leaves_order_pending(&self) -> bool {
        matches!(
            self,
            Self::Payment { .. } | Self::Backend(_) | Self::ReferenceMismatch(_)
        )
    }
}

/// Where a placed order stands.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutStep {
    /// Paid; the cart can be cleared.
    Confirmed(Order),
    /// The customer has to pay on the gateway's page.
    AwaitingPayment {
        pending: PendingCheckout,
        redirect_url: String,
    },
}

/// Runs checkouts against a backend client and the payment gateways.
pub struct CheckoutService<'a> {
    backend: &'a Backend,
    payments: &'a Payments,
    policy: &'a PricingPolicy,
    callback_url: String,
}

impl<'a> CheckoutService<'a> {
    /// `backend` should act as the signed-in customer when there is one.
    #[must_use]
    pub const fn new(
        backend: &'a Backend,
        payments: &'a Payments,
        policy: &'a PricingPolicy,
        callback_url: String,
    ) -> Self {
        Self {
            backend,
            payments,
            policy,
            callback_url,
        }
    }

    /// Create an order for the cart and start paying for it.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutFlowError::Invalid`] before anything is written.
    /// Once the order exists, a failed payment marks it `failed` and returns
    /// [`CheckoutFlowError::Payment`].
    #[instrument(skip_all, fields(items = cart.item_count(), method = %details.payment_method))]
    pub async fn place_order(
        &self,
        cart: &Cart,
        details: &CheckoutDetails,
        user_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<CheckoutStep, CheckoutFlowError> {
        let new_order = NewOrder::from_cart(cart, details, user_id, self.policy, now)?;
        let order = self.backend.create_order(&new_order).await?;
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total(),
            "Order created"
        );

        let request = PaymentRequest {
            email: order.customer_email.clone(),
            amount: order.total(),
            reference: order.order_number.clone(),
            callback_url: self.callback_url.clone(),
        };

        match self
            .payments
            .gateway(order.payment_method)
            .initialize(&request)
            .await
        {
            Ok(PaymentInit::Completed { reference }) => {
                let order = self.confirm(order, &reference).await?;
                Ok(CheckoutStep::Confirmed(order))
            }
            Ok(PaymentInit::Redirect { url, reference }) => {
                tracing::info!(order_id = %order.id, reference = %reference, "Awaiting gateway payment");
                Ok(CheckoutStep::AwaitingPayment {
                    pending: PendingCheckout {
                        order_id: order.id,
                        order_number: order.order_number,
                        payment_method: order.payment_method,
                    },
                    redirect_url: url,
                })
            }
            Err(source) => {
                tracing::warn!(order_id = %order.id, error = %source, "Payment could not be started");
                self.mark_failed(order.id).await;
                Err(CheckoutFlowError::Payment {
                    order_id: order.id,
                    source,
                })
            }
        }
    }

    /// Finish a redirected payment once the customer is back.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutFlowError::Declined`] (after marking the order
    /// `failed`) if the gateway reports the payment as unsuccessful.
    #[instrument(skip(self, pending), fields(order_id = %pending.order_id))]
    pub async fn complete_payment(
        &self,
        pending: &PendingCheckout,
        reference: &str,
    ) -> Result<Order, CheckoutFlowError> {
        if reference != pending.order_number {
            return Err(CheckoutFlowError::ReferenceMismatch(reference.to_string()));
        }

        let outcome = self
            .payments
            .gateway(pending.payment_method)
            .verify(reference)
            .await;

        match outcome {
            Ok(PaymentOutcome::Success { reference }) => {
                let order = self.backend.get_order(pending.order_id).await?;
                self.confirm(order, &reference).await
            }
            Ok(PaymentOutcome::Failed { reason }) => {
                tracing::info!(reason = %reason, "Payment declined");
                self.mark_failed(pending.order_id).await;
                Err(CheckoutFlowError::Declined {
                    order_id: pending.order_id,
                    reason,
                })
            }
            Err(source) => {
                // The payment may still succeed; leave the order pending.
                tracing::error!(error = %source, "Payment verification failed");
                Err(CheckoutFlowError::Payment {
                    order_id: pending.order_id,
                    source,
                })
            }
        }
    }

    /// Mark the order paid and queue its confirmation email.
    async fn confirm(&self, order: Order, reference: &str) -> Result<Order, CheckoutFlowError> {
        let mut updated = self
            .backend
            .update_payment_status(order.id, PaymentStatus::Completed, Some(reference))
            .await?;
        if updated.order_items.is_empty() {
            updated.order_items = order.order_items;
        }

        if let Err(e) = self.backend.enqueue_order_confirmation(&updated).await {
            tracing::warn!(order_id = %updated.id, error = %e, "Failed to queue confirmation email");
        }

        Ok(updated)
    }

    async fn mark_failed(&self, order_id: OrderId) {
        if let Err(e) = self
            .backend
            .update_payment_status(order_id, PaymentStatus::Failed, None)
            .await
        {
            tracing::error!(order_id = %order_id, error = %e, "Failed to mark payment failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::extract::{Path, Query, State};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use oja_backend::BackendConfig;
    use oja_core::cart::{CartItem, ProductSnapshot, VariantSelection};
    use oja_core::checkout::{ContactInfo, DeliveryAddress};
    use oja_core::{CurrencyCode, PaymentMethod, ProductId};
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use serde_json::{Value, json};

    use super::*;
    use crate::payments::PaymentGateway;

    /// Backend tables the flow touches, kept as JSON rows.
    #[derive(Default)]
    struct Tables {
        orders: Vec<Value>,
        order_items: Vec<Value>,
        email_queue: Vec<Value>,
        fail_email: bool,
    }

    type Shared = Arc<Mutex<Tables>>;

    type Inserted = (axum::http::StatusCode, Json<Value>);

    async fn insert_row(
        State(tables): State<Shared>,
        Path(table): Path<String>,
        Json(body): Json<Value>,
    ) -> Inserted {
        insert(&tables, &table, body)
    }

    async fn insert_order(State(tables): State<Shared>, Json(body): Json<Value>) -> Inserted {
        insert(&tables, "orders", body)
    }

    fn insert(tables: &Shared, table: &str, body: Value) -> Inserted {
        let mut tables = tables.lock().unwrap();
        let rows: Vec<Value> = match body {
            Value::Array(rows) => rows,
            row => vec![row],
        };
        let now = "2025-03-01T12:00:00Z";
        let stored: Vec<Value> = rows
            .into_iter()
            .map(|mut row| {
                row["id"] = json!(uuid::Uuid::new_v4());
                row["created_at"] = json!(now);
                row["updated_at"] = json!(now);
                row
            })
            .collect();
        match table {
            "orders" => tables.orders.extend(stored.clone()),
            "order_items" => tables.order_items.extend(stored.clone()),
            "email_queue" if tables.fail_email => {
                return (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "queue offline" })),
                );
            }
            "email_queue" => tables.email_queue.extend(stored.clone()),
            _ => {}
        }
        (axum::http::StatusCode::CREATED, Json(Value::Array(stored)))
    }

    async fn patch_order(
        State(tables): State<Shared>,
        Query(params): Query<Vec<(String, String)>>,
        Json(changes): Json<Value>,
    ) -> Json<Value> {
        let mut tables = tables.lock().unwrap();
        let id = params
            .iter()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.trim_start_matches("eq.").to_string())
            .unwrap();
        let mut updated = Vec::new();
        for row in &mut tables.orders {
            if row["id"] == json!(id) {
                for (key, value) in changes.as_object().unwrap() {
                    row[key] = value.clone();
                }
                updated.push(row.clone());
            }
        }
        Json(Value::Array(updated))
    }

    async fn get_orders(
        State(tables): State<Shared>,
        Query(params): Query<Vec<(String, String)>>,
    ) -> Json<Value> {
        let tables = tables.lock().unwrap();
        let id = params
            .iter()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| json!(v.trim_start_matches("eq.")));
        let rows: Vec<Value> = tables
            .orders
            .iter()
            .filter(|row| id.as_ref().is_none_or(|id| row["id"] == *id))
            .cloned()
            .map(|mut row| {
                let items: Vec<Value> = tables
                    .order_items
                    .iter()
                    .filter(|item| item["order_id"] == row["id"])
                    .cloned()
                    .collect();
                row["order_items"] = Value::Array(items);
                row
            })
            .collect();
        Json(Value::Array(rows))
    }

    async fn backend(tables: Shared) -> Backend {
        let app = Router::new()
            .route(
                "/rest/v1/orders",
                get(get_orders).post(insert_order).patch(patch_order),
            )
            .route("/rest/v1/{table}", post(insert_row))
            .with_state(tables);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        Backend::new(&BackendConfig::new(
            format!("http://{addr}").parse().unwrap(),
            SecretString::from("anon-key"),
        ))
        .unwrap()
    }

    struct Redirecting {
        succeed: bool,
    }

    #[async_trait]
    impl PaymentGateway for Redirecting {
        async fn initialize(&self, request: &PaymentRequest) -> Result<PaymentInit, PaymentError> {
            Ok(PaymentInit::Redirect {
                url: format!("https://pay.example.test/{}", request.reference),
                reference: request.reference.clone(),
            })
        }

        async fn verify(&self, reference: &str) -> Result<PaymentOutcome, PaymentError> {
            Ok(if self.succeed {
                PaymentOutcome::Success {
                    reference: reference.to_string(),
                }
            } else {
                PaymentOutcome::Failed {
                    reason: "Declined by issuer".to_string(),
                }
            })
        }
    }

    struct Unreachable;

    #[async_trait]
    impl PaymentGateway for Unreachable {
        async fn initialize(&self, _request: &PaymentRequest) -> Result<PaymentInit, PaymentError> {
            Err(PaymentError::Gateway("service unavailable".to_string()))
        }

        async fn verify(&self, _reference: &str) -> Result<PaymentOutcome, PaymentError> {
            Err(PaymentError::Gateway("service unavailable".to_string()))
        }
    }

    /// Verification fails until the gateway comes back.
    struct Flaky {
        verify_calls: Mutex<u32>,
    }

    #[async_trait]
    impl PaymentGateway for Flaky {
        async fn initialize(&self, request: &PaymentRequest) -> Result<PaymentInit, PaymentError> {
            Ok(PaymentInit::Redirect {
                url: format!("https://pay.example.test/{}", request.reference),
                reference: request.reference.clone(),
            })
        }

        async fn verify(&self, reference: &str) -> Result<PaymentOutcome, PaymentError> {
            let mut calls = self.verify_calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                return Err(PaymentError::Gateway("verification timed out".to_string()));
            }
            Ok(PaymentOutcome::Success {
                reference: reference.to_string(),
            })
        }
    }

    fn cart() -> Cart {
        let mut cart = Cart::new();
        cart.add(CartItem::new(
            ProductSnapshot {
                product_id: ProductId::generate(),
                title: "Ankara Wrap Dress".to_string(),
                price: Decimal::new(15_000, 0),
                discount_price: None,
                variant_surcharge: Decimal::ZERO,
                image: None,
                stock_quantity: 10,
                currency: CurrencyCode::NGN,
            },
            2,
            VariantSelection::new(),
        ))
        .unwrap();
        cart
    }

    fn details(method: PaymentMethod) -> CheckoutDetails {
        CheckoutDetails {
            contact: ContactInfo {
                first_name: "Ada".to_string(),
                last_name: "Obi".to_string(),
                email: "Ada@Example.com".to_string(),
                phone: "08030000000".to_string(),
            },
            address: DeliveryAddress {
                street: "12 Marina Road".to_string(),
                city: "Lagos".to_string(),
                state: "Lagos".to_string(),
                ..DeliveryAddress::default()
            },
            payment_method: method,
        }
    }

    const CALLBACK: &str = "http://localhost:3000/checkout/callback";

    #[tokio::test]
    async fn test_immediate_payment_confirms_order_and_queues_email() {
        let tables = Shared::default();
        let backend = backend(tables.clone()).await;
        let payments = Payments::stubbed();
        let policy = PricingPolicy::default();
        let service = CheckoutService::new(&backend, &payments, &policy, CALLBACK.to_string());

        let step = service
            .place_order(&cart(), &details(PaymentMethod::Stripe), None, Utc::now())
            .await
            .unwrap();

        let CheckoutStep::Confirmed(order) = step else {
            panic!("expected a confirmed order");
        };
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        assert_eq!(order.payment_reference.as_deref(), Some(order.order_number.as_str()));
        // 30,000 + 7.5% tax + 2,500 shipping
        assert_eq!(order.total_amount, Decimal::new(34_750, 0));
        assert_eq!(order.order_items.len(), 1);

        let tables = tables.lock().unwrap();
        assert_eq!(tables.orders.len(), 1);
        assert_eq!(tables.order_items.len(), 1);
        assert_eq!(tables.email_queue.len(), 1);
        assert_eq!(tables.email_queue[0]["to"], "ada@example.com");
    }

    #[tokio::test]
    async fn test_email_failure_does_not_fail_checkout() {
        let tables = Shared::default();
        tables.lock().unwrap().fail_email = true;
        let backend = backend(tables.clone()).await;
        let payments = Payments::stubbed();
        let policy = PricingPolicy::default();
        let service = CheckoutService::new(&backend, &payments, &policy, CALLBACK.to_string());

        let step = service
            .place_order(&cart(), &details(PaymentMethod::Paystack), None, Utc::now())
            .await
            .unwrap();
        assert!(matches!(step, CheckoutStep::Confirmed(_)));
    }

    #[tokio::test]
    async fn test_invalid_details_write_nothing() {
        let tables = Shared::default();
        let backend = backend(tables.clone()).await;
        let payments = Payments::stubbed();
        let policy = PricingPolicy::default();
        let service = CheckoutService::new(&backend, &payments, &policy, CALLBACK.to_string());

        let mut bad = details(PaymentMethod::Paystack);
        bad.address.city = "  ".to_string();
        let err = service
            .place_order(&cart(), &bad, None, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "missing_field");

        let err = service
            .place_order(&Cart::new(), &details(PaymentMethod::Paystack), None, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "empty_cart");
        assert!(tables.lock().unwrap().orders.is_empty());
    }

    #[tokio::test]
    async fn test_gateway_error_marks_order_failed() {
        let tables = Shared::default();
        let backend = backend(tables.clone()).await;
        let payments = Payments::stubbed().with_gateway(PaymentMethod::Paystack, Arc::new(Unreachable));
        let policy = PricingPolicy::default();
        let service = CheckoutService::new(&backend, &payments, &policy, CALLBACK.to_string());

        let err = service
            .place_order(&cart(), &details(PaymentMethod::Paystack), None, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "payment_failed");

        let tables = tables.lock().unwrap();
        assert_eq!(tables.orders[0]["payment_status"], "failed");
        assert!(tables.email_queue.is_empty());
    }

    #[tokio::test]
    async fn test_redirect_then_successful_callback() {
        let tables = Shared::default();
        let backend = backend(tables.clone()).await;
        let payments = Payments::stubbed()
            .with_gateway(PaymentMethod::Paystack, Arc::new(Redirecting { succeed: true }));
        let policy = PricingPolicy::default();
        let service = CheckoutService::new(&backend, &payments, &policy, CALLBACK.to_string());

        let step = service
            .place_order(&cart(), &details(PaymentMethod::Paystack), None, Utc::now())
            .await
            .unwrap();
        let CheckoutStep::AwaitingPayment {
            pending,
            redirect_url,
        } = step
        else {
            panic!("expected a gateway redirect");
        };
        assert!(redirect_url.ends_with(&pending.order_number));
        assert!(tables.lock().unwrap().email_queue.is_empty());

        let err = service
            .complete_payment(&pending, "ORD-0")
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutFlowError::ReferenceMismatch(_)));

        let order = service
            .complete_payment(&pending, &pending.order_number.clone())
            .await
            .unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        assert_eq!(order.order_items.len(), 1);
        assert_eq!(tables.lock().unwrap().email_queue.len(), 1);
    }

    #[tokio::test]
    async fn test_declined_callback_marks_order_failed() {
        let tables = Shared::default();
        let backend = backend(tables.clone()).await;
        let payments = Payments::stubbed()
            .with_gateway(PaymentMethod::Paystack, Arc::new(Redirecting { succeed: false }));
        let policy = PricingPolicy::default();
        let service = CheckoutService::new(&backend, &payments, &policy, CALLBACK.to_string());

        let CheckoutStep::AwaitingPayment { pending, .. } = service
            .place_order(&cart(), &details(PaymentMethod::Paystack), None, Utc::now())
            .await
            .unwrap()
        else {
            panic!("expected a gateway redirect");
        };

        let err = service
            .complete_payment(&pending, &pending.order_number)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "payment_declined");
        assert_eq!(tables.lock().unwrap().orders[0]["payment_status"], "failed");
    }

    #[tokio::test]
    async fn test_failed_verification_can_be_retried() {
        let tables = Shared::default();
        let backend = backend(tables.clone()).await;
        let gateway = Arc::new(Flaky {
            verify_calls: Mutex::new(0),
        });
        let payments = Payments::stubbed().with_gateway(PaymentMethod::Paystack, gateway);
        let policy = PricingPolicy::default();
        let service = CheckoutService::new(&backend, &payments, &policy, CALLBACK.to_string());

        let CheckoutStep::AwaitingPayment { pending, .. } = service
            .place_order(&cart(), &details(PaymentMethod::Paystack), None, Utc::now())
            .await
            .unwrap()
        else {
            panic!("expected a gateway redirect");
        };

        let err = service
            .complete_payment(&pending, &pending.order_number)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "payment_failed");
        assert!(err.leaves_order_pending());
        assert_eq!(tables.lock().unwrap().orders[0]["payment_status"], "pending");
        assert!(tables.lock().unwrap().email_queue.is_empty());

        let order = service
            .complete_payment(&pending, &pending.order_number)
            .await
            .unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        assert_eq!(tables.lock().unwrap().email_queue.len(), 1);
    }
}
