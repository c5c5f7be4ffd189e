//! Static content page route handlers.
//!
//! About, FAQ, policies and delivery information. Copy lives here rather
//! than in the backend; the shipping page reads the live pricing policy.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Router, extract::State, response::IntoResponse, routing::get};
use oja_core::checkout::{DELIVERY_COUNTRIES, PricingPolicy};
use oja_core::{CurrencyCode, Price};
use rust_decimal::Decimal;

use crate::filters;
use crate::routes::views::Layout;
use crate::state::AppState;

/// A titled block of page copy.
#[derive(Debug, Clone)]
pub struct Section {
    pub heading: String,
    pub body: String,
}

fn section(heading: &str, body: &str) -> Section {
    Section {
        heading: heading.to_string(),
        body: body.to_string(),
    }
}

/// Content page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/content.html")]
pub struct ContentPageTemplate {
    pub layout: Layout,
    pub title: String,
    pub description: String,
    pub sections: Vec<Section>,
}

fn page(layout: Layout, title: &str, description: &str, sections: Vec<Section>) -> ContentPageTemplate {
    ContentPageTemplate {
        layout,
        title: title.to_string(),
        description: description.to_string(),
        sections,
    }
}

/// Display the About page.
pub async fn about(layout: Layout) -> impl IntoResponse {
    page(
        layout,
        "About Oja",
        "A marketplace for fashion and beauty made and sold across Africa.",
        vec![
            section(
                "Our story",
                "Oja means market. We started with a single stall of hand-dyed \
                 adire and now work with makers across Nigeria, Ghana and Kenya.",
            ),
            section(
                "What we sell",
                "Clothing, accessories and beauty products, each listed with \
                 the sizes, colors and shades actually in stock.",
            ),
        ],
    )
}

/// Display the FAQ page.
pub async fn faq(layout: Layout) -> impl IntoResponse {
    page(
        layout,
        "Frequently Asked Questions",
        "Answers to the questions we hear most.",
        vec![
            section(
                "Do I need an account to order?",
                "No. Guests can check out and track orders with the order \
                 number and email address. An account keeps your order history.",
            ),
            section(
                "How do I pay?",
                "Card payments are handled by Paystack, Stripe or Flutterwave. \
                 We never see your card details.",
            ),
            section(
                "How do I track my order?",
                "Use the Track Order page with the number from your \
                 confirmation email.",
            ),
        ],
    )
}

/// Display the Privacy Policy page.
pub async fn privacy(layout: Layout) -> impl IntoResponse {
    page(
        layout,
        "Privacy Policy",
        "What we collect and why.",
        vec![
            section(
                "Information we collect",
                "Your name, contact details and delivery address when you \
                 order, and your account details if you register.",
            ),
            section(
                "How we use it",
                "To deliver your order, send order updates and answer your \
                 messages. We do not sell personal data.",
            ),
            section(
                "Cookies",
                "A single session cookie keeps your cart and sign-in. It is \
                 not used for advertising.",
            ),
        ],
    )
}

/// Display the Terms of Service page.
pub async fn terms(layout: Layout) -> impl IntoResponse {
    page(
        layout,
        "Terms of Service",
        "The terms that apply when you shop with us.",
        vec![
            section(
                "Orders",
                "An order is accepted once payment is confirmed. Prices \
                 include tax as shown at checkout.",
            ),
            section(
                "Availability",
                "Stock is checked when you add an item to your cart and again \
                 when the order is processed.",
            ),
        ],
    )
}

/// Shipping copy for a pricing policy.
#[must_use]
pub fn shipping_sections(policy: &PricingPolicy) -> Vec<Section> {
    let money = |amount: Decimal| Price::new(amount, CurrencyCode::NGN).display();
    vec![
        Section {
            heading: "Delivery fees".to_string(),
            body: format!(
                "Orders over {} ship free. Smaller orders pay a flat {}.",
                money(policy.free_shipping_over),
                money(policy.shipping_fee)
            ),
        },
        Section {
            heading: "Where we deliver".to_string(),
            body: format!("We currently deliver to {}.", DELIVERY_COUNTRIES.join(", ")),
        },
        section(
            "Delivery times",
            "Most orders arrive within 3 to 7 working days. Your order page \
             shows an estimated delivery date once the order ships.",
        ),
    ]
}

/// Display the Shipping page.
pub async fn shipping(State(state): State<AppState>, layout: Layout) -> impl IntoResponse {
    page(
        layout,
        "Shipping",
        "Delivery fees, destinations and times.",
        shipping_sections(state.pricing()),
    )
}

/// Display the Returns page.
pub async fn returns(layout: Layout) -> impl IntoResponse {
    page(
        layout,
        "Returns",
        "How to send something back.",
        vec![
            section(
                "Return window",
                "Unworn items with tags attached can be returned within 14 \
                 days of delivery.",
            ),
            section(
                "Refunds",
                "Refunds go back to the original payment method within 5 \
                 working days of the return arriving.",
            ),
            section(
                "Exceptions",
                "Opened beauty products cannot be returned for hygiene reasons.",
            ),
        ],
    )
}

/// Create the pages routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/about", get(about))
        .route("/faq", get(faq))
        .route("/privacy", get(privacy))
        .route("/terms", get(terms))
        .route("/shipping", get(shipping))
        .route("/returns", get(returns))
}
