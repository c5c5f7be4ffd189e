//! Oja Core - shared types, cart store and checkout pricing.
//!
//! This crate is used by every Oja component:
//! - `backend` - Client for the hosted backend (tables, auth, storage)
//! - `storefront` - Public-facing shop
//! - `admin` - Internal product and order management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. Records mirror backend rows one to one; the cart and checkout
//! modules hold the only real business rules in the system.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, and statuses
//! - [`catalog`] - Products, variants, images, categories
//! - [`cart`] - The shopping cart state container
//! - [`checkout`] - Pricing policy, order totals, checkout details
//! - [`order`] - Orders and order items
//! - [`account`] - Profiles and saved addresses
//! - [`records`] - Coupons, reviews, wishlists, contact messages

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod order;
pub mod records;
pub mod types;

pub use types::*;
