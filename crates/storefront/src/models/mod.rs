//! Session models for the storefront.

pub mod session;

pub use session::{CurrentUser, PendingCheckout, keys as session_keys};
