//! Cache types for catalog reads.

use oja_core::catalog::{Category, Page, Product, ProductDetail};

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<ProductDetail>),
    Products(Page<Product>),
    Categories(Vec<Category>),
}
