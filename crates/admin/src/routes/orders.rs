//! Order management route handlers.
//!
//! Admins list and filter every order, open one, and move its fulfillment
//! or payment status along.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::Redirect,
    routing::{get, post},
};
use oja_core::order::{Order, OrderFilters};
use oja_core::{OrderId, OrderStatus, PaymentStatus};
use serde::Deserialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::routes::dashboard::AdminUserView;
use crate::routes::views::{PER_PAGE, Pager, end_of_day, non_blank, start_of_day};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// One row of an order table.
#[derive(Debug, Clone)]
pub struct OrderRowView {
    pub id: String,
    pub number: String,
    pub customer: String,
    pub email: String,
    pub items: u32,
    pub total: String,
    pub status: String,
    pub payment_status: String,
    pub created_at: String,
}

impl From<&Order> for OrderRowView {
    fn from(order: &Order) -> Self {
        let name = order.contact_info.full_name();
        Self {
            id: order.id.to_string(),
            number: order.order_number.clone(),
            customer: if name.trim().is_empty() {
                order.customer_email.clone()
            } else {
                name.trim().to_string()
            },
            email: order.customer_email.clone(),
            items: order.item_count(),
            total: order.total().display(),
            status: order.status.to_string(),
            payment_status: order.payment_status.to_string(),
            created_at: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// One line of an order.
#[derive(Debug, Clone)]
pub struct OrderLineView {
    pub title: String,
    pub options: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

/// Everything shown on the order page.
#[derive(Debug, Clone)]
pub struct OrderDetailView {
    pub row: OrderRowView,
    pub phone: String,
    pub address: Vec<String>,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub estimated_delivery: Option<String>,
    pub lines: Vec<OrderLineView>,
    pub subtotal: String,
    pub tax: String,
    pub shipping: String,
    pub discount: Option<String>,
    pub total: String,
    /// Statuses the order may move to, current one included.
    pub next_statuses: Vec<&'static str>,
    pub is_terminal: bool,
}

impl From<&Order> for OrderDetailView {
    fn from(order: &Order) -> Self {
        let totals = order.totals();
        let address = &order.delivery_address;
        let phone = if order.contact_info.phone.trim().is_empty() {
            order.customer_phone.clone()
        } else {
            order.contact_info.phone.clone()
        };
        Self {
            row: OrderRowView::from(order),
            phone,
            address: [
                address.street.as_str(),
                address.city.as_str(),
                address.state.as_str(),
                address.postal_code.as_str(),
                address.country.as_str(),
            ]
            .into_iter()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
            payment_method: order.payment_method.label().to_string(),
            payment_reference: order.payment_reference.clone(),
            estimated_delivery: order
                .estimated_delivery
                .map(|at| at.format("%Y-%m-%d").to_string()),
            lines: order
                .order_items
                .iter()
                .map(|item| OrderLineView {
                    title: item.product_title.clone(),
                    options: item.variant_selections.describe(),
                    quantity: item.quantity,
                    unit_price: oja_core::Price::new(item.unit_price, order.currency).display(),
                    line_total: oja_core::Price::new(item.line_total(), order.currency).display(),
                })
                .collect(),
            subtotal: totals.subtotal.display(),
            tax: totals.tax.display(),
            shipping: totals.shipping.display(),
            discount: (!totals.discount.amount.is_zero()).then(|| totals.discount.display()),
            total: totals.total.display(),
            next_statuses: OrderStatus::ALL
                .iter()
                .copied()
                .filter(|next| order.status.can_transition_to(*next))
                .map(OrderStatus::as_str)
                .collect(),
            is_terminal: order.status.is_terminal(),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Order list template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub orders: Vec<OrderRowView>,
    pub pager: Option<Pager>,
    pub selected: FilterView,
    pub statuses: Vec<&'static str>,
    pub payment_statuses: Vec<&'static str>,
    pub error: Option<String>,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub order: OrderDetailView,
    pub payment_statuses: Vec<&'static str>,
    pub error: Option<String>,
    pub success: Option<String>,
}

// =============================================================================
// Query and Form Types
// =============================================================================

/// Order list query. Blank values mean "any".
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<u32>,
}

/// The list filters as typed back into the filter form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterView {
    pub status: String,
    pub payment_status: String,
    pub from: String,
    pub to: String,
}

/// Flash messages on the order page.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Status change form.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
    pub estimated_delivery: Option<String>,
}

/// Payment status change form.
#[derive(Debug, Deserialize)]
pub struct PaymentStatusForm {
    pub payment_status: String,
    pub payment_reference: Option<String>,
}

impl OrderListQuery {
    /// Typed filters, or the error code for the first malformed value.
    ///
    /// # Errors
    ///
    /// Returns `invalid_status` or `invalid_date`.
    pub fn filters(&self) -> std::result::Result<OrderFilters, &'static str> {
        let status = non_blank(self.status.as_deref())
            .map(str::parse::<OrderStatus>)
            .transpose()
            .map_err(|_| "invalid_status")?;
        let payment_status = non_blank(self.payment_status.as_deref())
            .map(str::parse::<PaymentStatus>)
            .transpose()
            .map_err(|_| "invalid_status")?;
        let from = non_blank(self.from.as_deref())
            .map(|v| start_of_day(v).ok_or("invalid_date"))
            .transpose()?;
        let to = non_blank(self.to.as_deref())
            .map(|v| end_of_day(v).ok_or("invalid_date"))
            .transpose()?;
        Ok(OrderFilters {
            status,
            payment_status,
            from,
            to,
        })
    }

    fn view(&self) -> FilterView {
        let text = |v: &Option<String>| non_blank(v.as_deref()).unwrap_or_default().to_string();
        FilterView {
            status: text(&self.status),
            payment_status: text(&self.payment_status),
            from: text(&self.from),
            to: text(&self.to),
        }
    }

    /// The filter part of the query string, for pager links.
    fn encoded(&self) -> String {
        let view = self.view();
        [
            ("status", view.status),
            ("payment_status", view.payment_status),
            ("from", view.from),
            ("to", view.to),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(&value)))
        .collect::<Vec<_>>()
        .join("&")
    }
}

fn parse_order_id(id: &str) -> Result<OrderId> {
    id.parse()
        .map_err(|_| AppError::NotFound(format!("order {id}")))
}

// =============================================================================
// Router
// =============================================================================

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(index))
        .route("/orders/{id}", get(show))
        .route("/orders/{id}/status", post(update_status))
        .route("/orders/{id}/payment-status", post(update_payment_status))
}

// =============================================================================
// Handlers
// =============================================================================

/// Order list with filters.
///
/// GET /orders
///
/// # Errors
///
/// Returns an error if the backend cannot be reached.
#[instrument(skip(admin, state))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<OrdersIndexTemplate> {
    let (orders, pager, error) = match query.filters() {
        Ok(filters) => {
            let page = state
                .backend()
                .get_all_orders(&filters, query.page.unwrap_or(1), PER_PAGE)
                .await?;
            let pager = Pager::new("/orders", &query.encoded(), &page);
            (
                page.items.iter().map(OrderRowView::from).collect(),
                Some(pager),
                None,
            )
        }
        Err(code) => (Vec::new(), None, Some(code.to_string())),
    };

    Ok(OrdersIndexTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/orders".to_string(),
        orders,
        pager,
        selected: query.view(),
        statuses: OrderStatus::ALL.iter().map(|s| s.as_str()).collect(),
        payment_statuses: PaymentStatus::ALL.iter().map(|s| s.as_str()).collect(),
        error,
    })
}

/// Order detail page.
///
/// GET /orders/{id}
///
/// # Errors
///
/// Returns 404 for unknown orders.
#[instrument(skip(admin, state))]
pub async fn show(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<MessageQuery>,
) -> Result<OrderShowTemplate> {
    let order = state.backend().get_order(parse_order_id(&id)?).await?;
    Ok(OrderShowTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/orders".to_string(),
        order: OrderDetailView::from(&order),
        payment_statuses: PaymentStatus::ALL.iter().map(|s| s.as_str()).collect(),
        error: query.error,
        success: query.success,
    })
}

/// Move an order to a new fulfillment status.
///
/// POST /orders/{id}/status
///
/// # Errors
///
/// Returns 404 for unknown orders. Invalid moves redirect back with an
/// error code.
#[instrument(skip(admin, state))]
pub async fn update_status(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect> {
    let order_id = parse_order_id(&id)?;
    let back = |query: &str| Redirect::to(&format!("/orders/{order_id}?{query}"));

    let Ok(next) = form.status.trim().parse::<OrderStatus>() else {
        return Ok(back("error=invalid_status"));
    };
    let estimated_delivery = match non_blank(form.estimated_delivery.as_deref()) {
        Some(date) => match end_of_day(date) {
            Some(at) => Some(at),
            None => return Ok(back("error=invalid_date")),
        },
        None => None,
    };

    let current = state.backend().get_order(order_id).await?;
    if !current.status.can_transition_to(next) {
        return Ok(back("error=invalid_transition"));
    }

    state
        .backend()
        .update_order_status(order_id, next, estimated_delivery)
        .await?;
    tracing::info!(
        admin_id = %admin.id,
        order_id = %order_id,
        from = %current.status,
        to = %next,
        "Order status changed"
    );
    Ok(back("success=status"))
}

/// Set an order's payment status.
///
/// POST /orders/{id}/payment-status
///
/// # Errors
///
/// Returns 404 for unknown orders.
#[instrument(skip(admin, state))]
pub async fn update_payment_status(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<PaymentStatusForm>,
) -> Result<Redirect> {
    let order_id = parse_order_id(&id)?;
    let Ok(status) = form.payment_status.trim().parse::<PaymentStatus>() else {
        return Ok(Redirect::to(&format!(
            "/orders/{order_id}?error=invalid_status"
        )));
    };

    state
        .backend()
        .update_payment_status(
            order_id,
            status,
            non_blank(form.payment_reference.as_deref()),
        )
        .await?;
    tracing::info!(admin_id = %admin.id, order_id = %order_id, to = %status, "Payment status changed");
    Ok(Redirect::to(&format!("/orders/{order_id}?success=payment")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn query(status: &str, from: &str, to: &str) -> OrderListQuery {
        OrderListQuery {
            status: Some(status.to_string()),
            payment_status: Some(String::new()),
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            page: None,
        }
    }

    #[test]
    fn test_filters_parse_status_and_dates() {
        let filters = query("shipped", "2026-01-01", "2026-01-31").filters().unwrap();
        assert_eq!(filters.status, Some(OrderStatus::Shipped));
        assert_eq!(filters.payment_status, None);
        assert_eq!(
            filters.to.unwrap().to_rfc3339(),
            "2026-01-31T23:59:59+00:00"
        );
    }

    #[test]
    fn test_blank_filters_mean_any() {
        let filters = query(" ", "", "").filters().unwrap();
        assert_eq!(filters, OrderFilters::default());
    }

    #[test]
    fn test_malformed_filters_report_codes() {
        assert_eq!(query("lost", "", "").filters(), Err("invalid_status"));
        assert_eq!(query("", "yesterday", "").filters(), Err("invalid_date"));
    }

    #[test]
    fn test_encoded_query_skips_blanks() {
        let q = query("pending", "2026-02-01", "");
        assert_eq!(q.encoded(), "status=pending&from=2026-02-01");
    }

    fn order(status: &str) -> Order {
        serde_json::from_value(serde_json::json!({
            "id": OrderId::generate(),
            "order_number": "ORD-1767225600000",
            "status": status,
            "payment_status": "pending",
            "subtotal": "20000",
            "tax_amount": "1500",
            "shipping_fee": "2500",
            "total_amount": "24000",
            "customer_email": "chidi@example.com",
            "customer_phone": "08030000000",
            "delivery_address": {"street": "4 Allen Avenue", "city": "Ikeja", "state": "Lagos"},
            "contact_info": {"first_name": "Chidi", "last_name": "Eze", "email": "chidi@example.com", "phone": ""},
            "payment_method": "paystack",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
            "order_items": []
        }))
        .unwrap()
    }

    #[test]
    fn test_detail_view_offers_forward_moves_only() {
        let view = OrderDetailView::from(&order("shipped"));
        assert_eq!(view.next_statuses, vec!["shipped", "delivered", "cancelled"]);
        assert_eq!(view.phone, "08030000000");
        assert_eq!(view.address, vec!["4 Allen Avenue", "Ikeja", "Lagos", "Nigeria"]);
        assert_eq!(view.discount, None);
        assert_eq!(view.row.customer, "Chidi Eze");
        assert_eq!(view.row.total, "₦24,000.00");
    }

    #[test]
    fn test_terminal_orders_stay_put() {
        let view = OrderDetailView::from(&order("delivered"));
        assert!(view.is_terminal);
        assert_eq!(view.next_statuses, vec!["delivered"]);
    }

    #[test]
    fn test_order_id_must_be_uuid() {
        assert!(matches!(
            parse_order_id("ORD-1"),
            Err(AppError::NotFound(_))
        ));
    }
}
