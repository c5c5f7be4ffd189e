//! Order history and order tracking.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Form, extract::State, response::IntoResponse};
use oja_core::checkout::OrderNumber;
use serde::Deserialize;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::routes::views::{Layout, OrderView};
use crate::state::AppState;

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersTemplate {
    pub layout: Layout,
    pub orders: Vec<OrderView>,
}

/// Track order page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/track.html")]
pub struct TrackOrderTemplate {
    pub layout: Layout,
    pub order_number: String,
    pub email: String,
    pub order: Option<OrderView>,
    pub error: Option<String>,
}

/// Track order form data.
#[derive(Debug, Deserialize)]
pub struct TrackOrderForm {
    pub order_number: String,
    pub email: String,
}

/// Display the signed-in customer's orders, newest first.
///
/// # Errors
///
/// Returns an error if the orders cannot be loaded.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    layout: Layout,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let orders = state
        .backend()
        .as_user(&user.access_token)
        .get_user_orders(user.id)
        .await?;

    Ok(OrdersTemplate {
        layout,
        orders: orders.iter().map(OrderView::from).collect(),
    })
}

/// Display the order tracking form.
pub async fn track_page(layout: Layout) -> impl IntoResponse {
    TrackOrderTemplate {
        layout,
        order_number: String::new(),
        email: String::new(),
        order: None,
        error: None,
    }
}

/// Look up an order by number and the email it was placed with.
///
/// Unknown numbers and mismatched emails get the same answer so order
/// numbers cannot be probed.
///
/// # Errors
///
/// Returns an error if the backend fails for a reason other than a missing
/// order.
#[instrument(skip_all, fields(order_number = %form.order_number))]
pub async fn track(
    State(state): State<AppState>,
    layout: Layout,
    Form(form): Form<TrackOrderForm>,
) -> Result<impl IntoResponse> {
    let found = match OrderNumber::parse(&form.order_number) {
        Some(number) => match state.backend().track_order(&number).await {
            Ok(order) => Some(order).filter(|o| o.placed_by(&form.email)),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    Ok(TrackOrderTemplate {
        layout,
        error: found.is_none().then(|| "not_found".to_string()),
        order: found.as_ref().map(OrderView::from),
        order_number: form.order_number,
        email: form.email,
    })
}
