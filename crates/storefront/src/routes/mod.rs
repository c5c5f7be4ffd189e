//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Home page
//! GET  /health                    - Liveness check
//! GET  /health/ready              - Readiness check (backend reachable)
//!
//! # Catalog
//! GET  /shop                      - Product listing with filters
//! GET  /new-arrivals              - Newest products
//! GET  /product/{id}              - Product detail
//!
//! # Cart (session-backed)
//! GET  /cart                      - Cart page
//! POST /cart/add                  - Add to cart
//! POST /cart/update               - Change line quantity
//! POST /cart/remove               - Remove line
//! POST /cart/clear                - Empty the cart
//! GET  /cart/count                - Cart count badge (fragment)
//!
//! # Checkout
//! GET  /checkout                  - Checkout form
//! POST /checkout                  - Place order
//! GET  /checkout/callback         - Payment gateway return
//! GET  /order-confirmation/{id}   - Order confirmation
//!
//! # Orders
//! GET  /orders                    - Order history (requires auth)
//! GET  /track-order               - Track order form
//! POST /track-order               - Look up an order by number and email
//!
//! # Account (requires auth)
//! GET  /account                   - Profile and addresses
//! POST /account                   - Update profile
//!
//! # Auth (POSTs are rate limited)
//! GET  /login                     - Login page
//! POST /login                     - Login action
//! GET  /register                  - Register page
//! POST /register                  - Register action
//! GET  /forgot-password           - Password reset request page
//! POST /forgot-password           - Send reset email
//! GET  /reset-password            - New password page
//! POST /reset-password            - Set new password
//! POST /logout                    - Logout action
//!
//! # Content
//! GET  /about, /faq, /privacy, /terms, /shipping, /returns
//! GET  /contact                   - Contact form
//! POST /contact                   - Send message
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod contact;
pub mod home;
pub mod orders;
pub mod pages;
pub mod products;
pub mod views;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
///
/// Only the form posts sit behind the rate limiter.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route_layer(auth_rate_limiter());

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/register", get(auth::register_page))
        .route("/forgot-password", get(auth::forgot_password_page))
        .route("/reset-password", get(auth::reset_password_page))
        .route("/logout", post(auth::logout))
        .merge(limited)
}

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/shop", get(products::shop))
        .route("/new-arrivals", get(products::new_arrivals))
        .route("/product/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", get(checkout::show).post(checkout::place_order))
        .route("/checkout/callback", get(checkout::callback))
        .route("/order-confirmation/{id}", get(checkout::confirmation))
}

/// Create the order and account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders::index))
        .route("/track-order", get(orders::track_page).post(orders::track))
        .route("/account", get(account::index).post(account::update))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .merge(product_routes())
        .nest("/cart", cart_routes())
        .merge(checkout_routes())
        .merge(account_routes())
        .merge(auth_routes())
        .merge(pages::router())
        .route("/contact", get(contact::show).post(contact::submit))
}
