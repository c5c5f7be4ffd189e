//! Display data shared by several pages.
//!
//! Records are flattened into pre-formatted strings here so templates never
//! do arithmetic or currency formatting.

use axum::{extract::FromRequestParts, http::request::Parts};
use oja_core::catalog::{Category, Product};
use oja_core::order::{Order, OrderItem};
use tower_sessions::Session;

use crate::models::{CurrentUser, session};

/// Header data every full page needs.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    /// Greeting for the signed-in customer.
    pub user_name: Option<String>,
    /// Units in the session cart.
    pub cart_count: u32,
}

impl<S> FromRequestParts<S> for Layout
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(session) = parts.extensions.get::<Session>() else {
            return Ok(Self::default());
        };
        let user = session
            .get::<CurrentUser>(session::keys::CURRENT_USER)
            .await
            .ok()
            .flatten();
        let cart = session::load_cart(session).await;

        Ok(Self {
            user_name: user.map(|u| u.display_name()),
            cart_count: cart.item_count(),
        })
    }
}

/// Product tile on listings.
#[derive(Debug, Clone)]
pub struct ProductCard {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub price: String,
    /// List price, shown struck through when discounted.
    pub list_price: Option<String>,
    pub discount_percent: Option<u32>,
    pub in_stock: bool,
}

impl From<&Product> for ProductCard {
    fn from(product: &Product) -> Self {
        let discounted = product.active_discount().is_some();
        Self {
            id: product.id.to_string(),
            title: product.title.clone(),
            image: product.cover_image().map(str::to_string),
            price: product.effective_price().display(),
            list_price: discounted.then(|| product.list_price().display()),
            discount_percent: product.discount_percent(),
            in_stock: product.is_in_stock(),
        }
    }
}

/// Category link.
#[derive(Debug, Clone)]
pub struct CategoryLink {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
}

impl From<&Category> for CategoryLink {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.to_string(),
            name: category.name.clone(),
            image: category.image_url.clone(),
        }
    }
}

/// Order summary line.
#[derive(Debug, Clone)]
pub struct OrderItemView {
    pub title: String,
    pub options: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
    pub image: Option<String>,
}

/// Order as shown on confirmation, history and tracking pages.
#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: String,
    pub number: String,
    pub placed_on: String,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub email: String,
    pub address: String,
    pub estimated_delivery: Option<String>,
    pub items: Vec<OrderItemView>,
    pub item_count: u32,
    pub subtotal: String,
    pub tax: String,
    pub shipping: String,
    pub total: String,
}

impl OrderView {
    fn item(order: &Order, item: &OrderItem) -> OrderItemView {
        let money = |amount| oja_core::Price::new(amount, order.currency).display();
        OrderItemView {
            title: item.product_title.clone(),
            options: item.variant_selections.describe(),
            quantity: item.quantity,
            unit_price: money(item.unit_price),
            line_total: money(item.line_total()),
            image: item.product_image.clone(),
        }
    }
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        let totals = order.totals();
        Self {
            id: order.id.to_string(),
            number: order.order_number.clone(),
            placed_on: order.created_at.format("%B %-d, %Y").to_string(),
            status: order.status.to_string(),
            payment_status: order.payment_status.to_string(),
            payment_method: order.payment_method.label().to_string(),
            email: order.customer_email.clone(),
            address: order.delivery_address.one_line(),
            estimated_delivery: order
                .estimated_delivery
                .map(|at| at.format("%B %-d, %Y").to_string()),
            items: order
                .order_items
                .iter()
                .map(|item| Self::item(order, item))
                .collect(),
            item_count: order.item_count(),
            subtotal: totals.subtotal.display(),
            tax: totals.tax.display(),
            shipping: totals.shipping.display(),
            total: totals.total.display(),
        }
    }
}
