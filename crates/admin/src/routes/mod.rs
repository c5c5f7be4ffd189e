//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                        - Liveness check
//! GET  /health/ready                  - Readiness check (backend reachable)
//!
//! # Dashboard
//! GET  /                              - Recent orders and counts
//!
//! # Auth (email + password, admin role required)
//! GET  /auth/login                    - Login page
//! POST /auth/login                    - Login action
//! POST /auth/logout                   - Logout
//!
//! # Products
//! GET  /products                      - Product listing with title search
//! GET  /products/new                  - Create form
//! POST /products                      - Create (multipart, optional image)
//! GET  /products/{id}/edit            - Edit form
//! POST /products/{id}                 - Update (multipart, optional image)
//! POST /products/{id}/delete          - Delete
//!
//! # Orders
//! GET  /orders                        - Order listing with status/date filters
//! GET  /orders/{id}                   - Order detail
//! POST /orders/{id}/status            - Change fulfillment status
//! POST /orders/{id}/payment-status    - Change payment status
//! ```

pub mod auth;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod views;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Create all routes for the admin panel.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .merge(auth::router())
        .merge(products::router())
        .merge(orders::router())
}
