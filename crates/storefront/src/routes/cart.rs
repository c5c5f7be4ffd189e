//! Cart route handlers.
//!
//! The cart lives in the session. Each mutation loads it, applies the change
//! and stores it back; totals are recomputed on every render.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use oja_core::cart::{Cart, CartError, CartItem, ProductSnapshot, VariantSelection};
use oja_core::checkout::PricingPolicy;
use oja_core::{CartLineId, ProductId, VariantType};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::models::session::{load_cart, save_cart};
use crate::routes::views::Layout;
use crate::state::AppState;

/// Cart item display data for templates.
#[derive(Debug, Clone)]
pub struct CartItemView {
    pub id: String,
    pub product_id: String,
    pub title: String,
    pub options: String,
    pub quantity: u32,
    pub max_quantity: u32,
    pub price: String,
    pub line_price: String,
    pub image: Option<String>,
}

/// Cart display data for templates.
#[derive(Debug, Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u32,
    pub subtotal: String,
    pub tax: String,
    pub shipping: String,
    pub total: String,
    pub ships_free: bool,
    /// Threshold above which shipping is free, formatted.
    pub free_shipping_over: String,
}

impl CartView {
    /// Display data for a cart under a pricing policy.
    #[must_use]
    pub fn new(cart: &Cart, policy: &PricingPolicy) -> Self {
        let totals = cart.totals(policy);
        Self {
            items: cart
                .items()
                .iter()
                .map(|line| CartItemView {
                    id: line.id.to_string(),
                    product_id: line.product.product_id.to_string(),
                    title: line.product.title.clone(),
                    options: line.variant_selections.describe(),
                    quantity: line.quantity,
                    max_quantity: line.product.stock_quantity,
                    price: line.unit_price().display(),
                    line_price: line.line_total().display(),
                    image: line.product.image.clone(),
                })
                .collect(),
            item_count: cart.item_count(),
            subtotal: totals.subtotal.display(),
            tax: totals.tax.display(),
            shipping: totals.shipping.display(),
            total: totals.total.display(),
            ships_free: totals.ships_free(),
            free_shipping_over: oja_core::Price::new(policy.free_shipping_over, cart.currency())
                .display(),
        }
    }
}

/// Short code for a rejected cart change, used in `?error=` redirects.
#[must_use]
pub const fn cart_error_code(err: &CartError) -> &'static str {
    match err {
        CartError::InvalidQuantity => "invalid_quantity",
        CartError::OutOfStock { .. } => "out_of_stock",
        CartError::InsufficientStock { .. } => "insufficient_stock",
        CartError::UnknownVariant { .. } => "unknown_variant",
        CartError::CurrencyMismatch { .. } => "currency_mismatch",
    }
}

/// Add to cart form data.
///
/// Variant choices arrive as one optional field per attribute.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    pub quantity: Option<u32>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub shade: Option<String>,
    pub material: Option<String>,
}

impl AddToCartForm {
    /// The chosen variants. Blank choices are left out.
    #[must_use]
    pub fn selection(&self) -> VariantSelection {
        let mut selection = VariantSelection::new();
        for (variant_type, value) in [
            (VariantType::Size, &self.size),
            (VariantType::Color, &self.color),
            (VariantType::Shade, &self.shade),
            (VariantType::Material, &self.material),
        ] {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                selection.insert(variant_type, value);
            }
        }
        selection
    }
}

/// Update cart form data. Zero or less removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub line_id: String,
    pub quantity: i64,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub line_id: String,
}

/// Query parameters for error display.
#[derive(Debug, Deserialize)]
pub struct CartQuery {
    pub error: Option<String>,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: Layout,
    pub cart: CartView,
    pub error: Option<String>,
}

/// Cart count badge fragment template.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Display cart page.
#[instrument(skip(state, session, layout))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    layout: Layout,
    Query(query): Query<CartQuery>,
) -> impl IntoResponse {
    let cart = load_cart(&session).await;
    CartShowTemplate {
        layout,
        cart: CartView::new(&cart, state.pricing()),
        error: query.error,
    }
}

/// Add a product (with its variant choices) to the cart.
///
/// The price and stock are snapshotted from the catalog now, not taken from
/// the form.
///
/// # Errors
///
/// Returns 404 for unknown products and an error if the session cannot be
/// saved. Rejected quantities redirect back to the product page.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<Redirect> {
    let product_id: ProductId = form
        .product_id
        .parse()
        .map_err(|_| AppError::NotFound(format!("product {}", form.product_id)))?;
    let product_page = format!("/product/{product_id}");

    let detail = state.backend().get_product(product_id).await?;
    let item = ProductSnapshot::for_selection(&detail, &form.selection())
        .map(|snapshot| CartItem::new(snapshot, form.quantity.unwrap_or(1), form.selection()));

    let mut cart = load_cart(&session).await;
    match item.and_then(|item| cart.add(item)) {
        Ok(_) => {
            save_cart(&session, &cart).await?;
            let product_id = product_id.to_string();
            add_breadcrumb("cart", "Added to cart", Some(&[("product_id", product_id.as_str())]));
            Ok(Redirect::to(&format!("{product_page}?added=1")))
        }
        Err(e) => {
            tracing::info!(error = %e, "Add to cart rejected");
            Ok(Redirect::to(&format!(
                "{product_page}?error={}",
                cart_error_code(&e)
            )))
        }
    }
}

fn parse_line(line_id: &str) -> Option<CartLineId> {
    line_id.parse().ok()
}

/// Change a line's quantity.
///
/// # Errors
///
/// Returns an error if the session cannot be saved.
#[instrument(skip(session))]
pub async fn update(session: Session, Form(form): Form<UpdateCartForm>) -> Result<Redirect> {
    let Some(line_id) = parse_line(&form.line_id) else {
        return Ok(Redirect::to("/cart"));
    };
    let quantity = u32::try_from(form.quantity.max(0)).unwrap_or(u32::MAX);

    let mut cart = load_cart(&session).await;
    if let Err(e) = cart.update_quantity(line_id, quantity) {
        return Ok(Redirect::to(&format!("/cart?error={}", cart_error_code(&e))));
    }
    save_cart(&session, &cart).await?;
    Ok(Redirect::to("/cart"))
}

/// Remove a line.
///
/// # Errors
///
/// Returns an error if the session cannot be saved.
#[instrument(skip(session))]
pub async fn remove(session: Session, Form(form): Form<RemoveFromCartForm>) -> Result<Redirect> {
    if let Some(line_id) = parse_line(&form.line_id) {
        let mut cart = load_cart(&session).await;
        cart.remove(line_id);
        save_cart(&session, &cart).await?;
    }
    Ok(Redirect::to("/cart"))
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if the session cannot be saved.
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<Redirect> {
    save_cart(&session, &Cart::new()).await?;
    Ok(Redirect::to("/cart"))
}

/// Cart count badge fragment.
#[instrument(skip(session))]
pub async fn count(session: Session) -> impl IntoResponse {
    CartCountTemplate {
        count: load_cart(&session).await.item_count(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use oja_core::CurrencyCode;
    use rust_decimal::Decimal;

    use super::*;

    fn form(size: Option<&str>, color: Option<&str>) -> AddToCartForm {
        AddToCartForm {
            product_id: ProductId::generate().to_string(),
            quantity: None,
            size: size.map(str::to_string),
            color: color.map(str::to_string),
            shade: Some("  ".to_string()),
            material: None,
        }
    }

    #[test]
    fn test_selection_skips_blank_choices() {
        let selection = form(Some("M"), None).selection();
        assert_eq!(selection.get(VariantType::Size), Some("M"));
        assert_eq!(selection.get(VariantType::Shade), None);
        assert!(form(None, Some("")).selection().is_empty());
    }

    #[test]
    fn test_cart_view_totals() {
        let mut cart = Cart::new();
        cart.add(CartItem::new(
            ProductSnapshot {
                product_id: ProductId::generate(),
                title: "Adire Tote".to_string(),
                price: Decimal::new(12_000, 0),
                discount_price: Some(Decimal::new(10_000, 0)),
                variant_surcharge: Decimal::ZERO,
                image: None,
                stock_quantity: 5,
                currency: CurrencyCode::NGN,
            },
            2,
            VariantSelection::new(),
        ))
        .unwrap();

        let view = CartView::new(&cart, &PricingPolicy::default());
        assert_eq!(view.item_count, 2);
        assert_eq!(view.subtotal, "₦20,000.00");
        assert_eq!(view.tax, "₦1,500.00");
        assert_eq!(view.shipping, "₦2,500.00");
        assert_eq!(view.total, "₦24,000.00");
        assert!(!view.ships_free);
        assert_eq!(view.items[0].price, "₦10,000.00");
    }

    #[test]
    fn test_empty_cart_view_is_zero() {
        let view = CartView::new(&Cart::new(), &PricingPolicy::default());
        assert!(view.items.is_empty());
        assert_eq!(view.total, "₦0.00");
        assert_eq!(view.shipping, "₦0.00");
    }

    #[test]
    fn test_cart_page_renders_error_and_badge() {
        let html = CartShowTemplate {
            layout: Layout {
                user_name: Some("Ada".to_string()),
                cart_count: 3,
            },
            cart: CartView::new(&Cart::new(), &PricingPolicy::default()),
            error: Some("out_of_stock".to_string()),
        }
        .render()
        .unwrap();

        assert!(html.contains("That item is out of stock."));
        assert!(html.contains("Your cart is empty."));
        assert!(html.contains("Hi, Ada"));
        assert!(html.contains(r#"<span class="badge">3</span>"#));
    }

    #[test]
    fn test_cart_error_codes() {
        assert_eq!(cart_error_code(&CartError::InvalidQuantity), "invalid_quantity");
        assert_eq!(
            cart_error_code(&CartError::OutOfStock {
                title: "Tote".to_string()
            }),
            "out_of_stock"
        );
        assert_eq!(
            cart_error_code(&CartError::CurrencyMismatch {
                title: "Sneakers".to_string(),
                expected: CurrencyCode::NGN,
                found: CurrencyCode::USD,
            }),
            "currency_mismatch"
        );
        assert_ne!(
            crate::filters::describe_error("currency_mismatch"),
            crate::filters::describe_error("unknown code")
        );
    }
}
