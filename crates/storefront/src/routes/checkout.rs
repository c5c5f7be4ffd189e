//! Checkout route handlers.
//!
//! ```text
//! GET  /checkout                 form with order summary
//! POST /checkout                 place the order and start payment
//! GET  /checkout/callback        back from the payment gateway
//! GET  /order-confirmation/{id}  thank-you page
//! ```

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use oja_backend::Backend;
use oja_core::checkout::{CheckoutDetails, ContactInfo, DELIVERY_COUNTRIES, DeliveryAddress};
use oja_core::{OrderId, PaymentMethod};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::models::{CurrentUser, PendingCheckout};
use crate::models::session::{
    complete_checkout, last_order, load_cart, set_pending_checkout, take_pending_checkout,
};
use crate::routes::cart::CartView;
use crate::routes::views::{Layout, OrderView};
use crate::services::{CheckoutFlowError, CheckoutService, CheckoutStep};
use crate::state::AppState;

/// Checkout form data.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

impl CheckoutForm {
    /// Details for the checkout flow. An unknown payment method falls back
    /// to the default gateway.
    #[must_use]
    pub fn details(self) -> CheckoutDetails {
        let mut address = DeliveryAddress {
            street: self.street,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            ..DeliveryAddress::default()
        };
        if let Some(country) = self.country.filter(|c| !c.trim().is_empty()) {
            address.country = country.trim().to_string();
        }

        CheckoutDetails {
            contact: ContactInfo {
                first_name: self.first_name,
                last_name: self.last_name,
                email: self.email,
                phone: self.phone,
            },
            address,
            payment_method: self
                .payment_method
                .and_then(|m| m.parse().ok())
                .unwrap_or_default(),
        }
    }
}

/// Query parameters on the checkout page.
#[derive(Debug, Deserialize)]
pub struct CheckoutQuery {
    pub error: Option<String>,
}

/// Query parameters the gateway appends to the callback URL.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub reference: Option<String>,
    /// Paystack sends the reference twice; either will do.
    pub trxref: Option<String>,
}

/// Payment method radio button.
#[derive(Debug, Clone)]
pub struct PaymentOption {
    pub value: &'static str,
    pub label: &'static str,
    pub checked: bool,
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub layout: Layout,
    pub cart: CartView,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub countries: Vec<&'static str>,
    pub payment_options: Vec<PaymentOption>,
    pub error: Option<String>,
}

/// Order confirmation page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/confirmation.html")]
pub struct ConfirmationTemplate {
    pub layout: Layout,
    pub order: OrderView,
}

/// Backend client acting as the shopper when signed in.
fn shopper_backend(state: &AppState, user: Option<&CurrentUser>) -> Backend {
    user.map_or_else(
        || state.backend().clone(),
        |u| state.backend().as_user(&u.access_token),
    )
}

fn checkout_service<'a>(
    state: &'a AppState,
    backend: &'a Backend,
) -> CheckoutService<'a> {
    CheckoutService::new(
        backend,
        state.payments(),
        state.pricing(),
        state.config().url_for("/checkout/callback"),
    )
}

/// Display the checkout form. Empty carts go back to the cart page.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    layout: Layout,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<CheckoutQuery>,
) -> Response {
    let cart = load_cart(&session).await;
    if cart.is_empty() {
        return Redirect::to("/cart").into_response();
    }

    let (first_name, last_name, email, phone) = user
        .map(|u| (u.first_name, u.last_name, u.email, u.phone))
        .unwrap_or_default();

    CheckoutTemplate {
        layout,
        cart: CartView::new(&cart, state.pricing()),
        first_name,
        last_name,
        email,
        phone,
        countries: DELIVERY_COUNTRIES.to_vec(),
        payment_options: PaymentMethod::ALL
            .iter()
            .map(|m| PaymentOption {
                value: m.as_str(),
                label: m.label(),
                checked: *m == PaymentMethod::default(),
            })
            .collect(),
        error: query.error,
    }
    .into_response()
}

/// Place the order for the session cart.
///
/// Paid orders empty the cart and go to the confirmation page. Gateway
/// payments are remembered in the session and the browser is sent to the
/// gateway. Failures return to the form with the cart untouched.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
#[instrument(skip_all)]
pub async fn place_order(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<Redirect> {
    let cart = load_cart(&session).await;
    if cart.is_empty() {
        return Ok(Redirect::to("/cart"));
    }

    let backend = shopper_backend(&state, user.as_ref());
    let service = checkout_service(&state, &backend);

    match service
        .place_order(&cart, &form.details(), user.as_ref().map(|u| u.id), Utc::now())
        .await
    {
        Ok(CheckoutStep::Confirmed(order)) => {
            complete_checkout(&session, order.id).await?;
            add_breadcrumb(
                "checkout",
                "Order placed",
                Some(&[("order_number", order.order_number.as_str())]),
            );
            Ok(Redirect::to(&format!("/order-confirmation/{}", order.id)))
        }
        Ok(CheckoutStep::AwaitingPayment {
            pending,
            redirect_url,
        }) => {
            set_pending_checkout(&session, &pending).await?;
            Ok(Redirect::to(&redirect_url))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Checkout failed");
            Ok(Redirect::to(&format!("/checkout?error={}", e.code())))
        }
    }
}

/// Finish a gateway payment.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect> {
    let Some(pending) = take_pending_checkout(&session).await? else {
        tracing::info!("Payment callback without a pending checkout");
        return Ok(Redirect::to("/cart"));
    };
    let Some(reference) = query.reference.or(query.trxref) else {
        return Ok(Redirect::to("/checkout?error=payment_reference"));
    };

    let backend = shopper_backend(&state, user.as_ref());
    let service = checkout_service(&state, &backend);

    match service.complete_payment(&pending, &reference).await {
        Ok(order) => {
            complete_checkout(&session, order.id).await?;
            Ok(Redirect::to(&format!("/order-confirmation/{}", order.id)))
        }
        Err(e) => {
            tracing::warn!(error = %e, order_id = %pending.order_id, "Payment not completed");
            keep_if_payable(&session, &pending, &e).await?;
            Ok(Redirect::to(&format!("/checkout?error={}", e.code())))
        }
    }
}

/// Put the pending checkout back when its order can still be paid.
async fn keep_if_payable(
    session: &Session,
    pending: &PendingCheckout,
    error: &CheckoutFlowError,
) -> std::result::Result<(), tower_sessions::session::Error> {
    if error.leaves_order_pending() {
        set_pending_checkout(session, pending).await?;
    }
    Ok(())
}

/// Display the confirmation for an order placed from this browser or by the
/// signed-in customer.
///
/// # Errors
///
/// Returns 404 for orders the visitor did not place.
#[instrument(skip_all)]
pub async fn confirmation(
    State(state): State<AppState>,
    session: Session,
    layout: Layout,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let not_found = || AppError::NotFound(format!("order {id}"));
    let order_id: OrderId = id.parse().map_err(|_| not_found())?;

    let backend = shopper_backend(&state, user.as_ref());
    let order = backend.get_order(order_id).await?;

    let placed_here = last_order(&session).await == Some(order_id);
    let owned = user.is_some_and(|u| order.user_id == Some(u.id));
    if !placed_here && !owned {
        return Err(not_found());
    }

    Ok(ConfirmationTemplate {
        layout,
        order: OrderView::from(&order),
    })
}
