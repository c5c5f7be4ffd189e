//! Business logic services for storefront.
//!
//! Route handlers stay thin: anything that spans several backend calls and a
//! payment gateway lives here.

pub mod checkout;

pub use checkout::{CheckoutFlowError, CheckoutService, CheckoutStep};
