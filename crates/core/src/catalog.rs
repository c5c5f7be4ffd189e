//! Catalog records: products, variants, images and categories.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::types::{
    CategoryId, CurrencyCode, ImageId, Price, ProductId, ProductStatus, VariantId, VariantType,
};

/// A product row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub discount_price: Option<Decimal>,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub stock_quantity: i32,
    /// Public image URLs, first one is the cover image.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub rating_avg: Decimal,
    #[serde(default)]
    pub rating_count: i32,
    #[serde(default)]
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// List price.
    #[must_use]
    pub const fn list_price(&self) -> Price {
        Price::new(self.price, self.currency)
    }

    /// Discount price, only if it is actually below the list price.
    #[must_use]
    pub fn active_discount(&self) -> Option<Decimal> {
        self.discount_price
            .filter(|discount| *discount >= Decimal::ZERO && *discount < self.price)
    }

    /// The price a customer pays per unit.
    #[must_use]
    pub fn effective_price(&self) -> Price {
        Price::new(
            self.active_discount().unwrap_or(self.price),
            self.currency,
        )
    }

    /// Whole-percent saving of the discount over the list price.
    #[must_use]
    pub fn discount_percent(&self) -> Option<u32> {
        use rust_decimal::prelude::ToPrimitive;

        let discount = self.active_discount()?;
        if self.price <= Decimal::ZERO {
            return None;
        }
        ((self.price - discount) / self.price * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u32()
    }

    /// Units available to sell; negative stock counts as none.
    #[must_use]
    pub fn available_stock(&self) -> u32 {
        u32::try_from(self.stock_quantity).unwrap_or(0)
    }

    /// Whether at least one unit can be sold.
    #[must_use]
    pub fn is_in_stock(&self) -> bool {
        self.available_stock() > 0
    }

    /// Cover image URL.
    #[must_use]
    pub fn cover_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// A purchasable variation of a product (a size, a shade, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    #[serde(rename = "type")]
    pub variant_type: VariantType,
    pub value: String,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub additional_price: Option<Decimal>,
}

/// Gallery image attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: ImageId,
    pub product_id: ProductId,
    pub url: String,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub display_order: i32,
}

/// A product together with its variants and gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    #[serde(default)]
    pub gallery: Vec<ProductImage>,
}

impl ProductDetail {
    /// Variant values grouped by type, in first-seen order.
    #[must_use]
    pub fn options(&self) -> Vec<(VariantType, Vec<&ProductVariant>)> {
        let mut groups: Vec<(VariantType, Vec<&ProductVariant>)> = Vec::new();
        for variant in &self.variants {
            match groups.iter_mut().find(|(t, _)| *t == variant.variant_type) {
                Some((_, values)) => values.push(variant),
                None => groups.push((variant.variant_type, vec![variant])),
            }
        }
        groups
    }

    /// Find the variant with the given type and value.
    #[must_use]
    pub fn variant(&self, variant_type: VariantType, value: &str) -> Option<&ProductVariant> {
        self.variants
            .iter()
            .find(|v| v.variant_type == variant_type && v.value == value)
    }

    /// Image URLs for the gallery: gallery rows by display order, falling
    /// back to the product's own image list.
    #[must_use]
    pub fn image_urls(&self) -> Vec<&str> {
        if self.gallery.is_empty() {
            return self.product.images.iter().map(String::as_str).collect();
        }
        let mut gallery: Vec<&ProductImage> = self.gallery.iter().collect();
        gallery.sort_by_key(|img| (!img.is_primary, img.display_order));
        gallery.into_iter().map(|img| img.url.as_str()).collect()
    }
}

/// A catalog category. Categories nest through `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
}

impl Category {
    /// Top-level categories have no parent.
    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Listing sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceLow,
    PriceHigh,
    Rating,
}

impl ProductSort {
    pub const ALL: &'static [Self] = &[Self::Newest, Self::PriceLow, Self::PriceHigh, Self::Rating];

    /// Column and direction, as `(column, ascending)`.
    #[must_use]
    pub const fn ordering(self) -> (&'static str, bool) {
        match self {
            Self::Newest => ("created_at", false),
            Self::PriceLow => ("price", true),
            Self::PriceHigh => ("price", false),
            Self::Rating => ("rating_avg", false),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceLow => "price_low",
            Self::PriceHigh => "price_high",
            Self::Rating => "rating",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "Newest",
            Self::PriceLow => "Price: Low to High",
            Self::PriceHigh => "Price: High to Low",
            Self::Rating => "Top Rated",
        }
    }
}

/// Shop listing filters. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductFilters {
    #[serde(default)]
    pub category: Option<CategoryId>,
    #[serde(default)]
    pub min_price: Option<Decimal>,
    #[serde(default)]
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
}

impl ProductFilters {
    /// Search text with characters that would break a filter expression
    /// removed. Blank searches become `None`.
    #[must_use]
    pub fn search_term(&self) -> Option<String> {
        let term: String = self
            .search
            .as_deref()?
            .chars()
            .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '%' | '"' | '\\'))
            .collect();
        let term = term.trim();
        (!term.is_empty()).then(|| term.to_string())
    }
}

/// One page of a counted listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows matching the query across all pages.
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    /// Zero-based `(from, to)` row range, inclusive, for a 1-based page.
    #[must_use]
    pub fn bounds(page: u32, per_page: u32) -> (u64, u64) {
        let page = u64::from(page.max(1));
        let per_page = u64::from(per_page.max(1));
        let from = (page - 1) * per_page;
        (from, from + per_page - 1)
    }

    #[must_use]
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.per_page))
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages()
    }
}

/// A variant submitted alongside a new product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVariant {
    #[serde(rename = "type")]
    pub variant_type: VariantType,
    pub value: String,
    pub stock_quantity: i32,
    pub sku: String,
    pub additional_price: Option<Decimal>,
}

/// Variant row with its owning product.
#[derive(Debug, Serialize)]
pub struct NewVariantRow<'a> {
    pub product_id: ProductId,
    #[serde(flatten)]
    pub variant: &'a NewVariant,
}

/// Errors from validating product input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductInputError {
    #[error("title is required")]
    MissingTitle,
    #[error("price cannot be negative")]
    NegativePrice,
    #[error("discount price must be below the list price")]
    DiscountNotLower,
    #[error("stock quantity cannot be negative")]
    NegativeStock,
}

/// Payload for creating a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub category_id: Option<CategoryId>,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub currency: CurrencyCode,
    pub sku: String,
    pub stock_quantity: i32,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub status: ProductStatus,
}

impl NewProduct {
    /// Check field constraints before sending to the backend.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ProductInputError> {
        validate_fields(
            &self.title,
            self.price,
            self.discount_price,
            self.stock_quantity,
        )
    }
}

/// Partial update for a product. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    /// `Some(None)` clears the discount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_price: Option<Option<Decimal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
}

impl ProductUpdate {
    /// Check the constraints of every field being set.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ProductInputError> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ProductInputError::MissingTitle);
        }
        if self.price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(ProductInputError::NegativePrice);
        }
        if let (Some(price), Some(Some(discount))) = (self.price, self.discount_price)
            && discount >= price
        {
            return Err(ProductInputError::DiscountNotLower);
        }
        if self.stock_quantity.is_some_and(|s| s < 0) {
            return Err(ProductInputError::NegativeStock);
        }
        Ok(())
    }
}

fn validate_fields(
    title: &str,
    price: Decimal,
    discount_price: Option<Decimal>,
    stock_quantity: i32,
) -> Result<(), ProductInputError> {
    if title.trim().is_empty() {
        return Err(ProductInputError::MissingTitle);
    }
    if price < Decimal::ZERO {
        return Err(ProductInputError::NegativePrice);
    }
    if discount_price.is_some_and(|d| d >= price || d < Decimal::ZERO) {
        return Err(ProductInputError::DiscountNotLower);
    }
    if stock_quantity < 0 {
        return Err(ProductInputError::NegativeStock);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A product priced in whole naira.
    pub fn product(title: &str, price: i64, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::generate(),
            title: title.to_string(),
            description: String::new(),
            category_id: None,
            subcategory: None,
            price: Decimal::new(price, 0),
            discount_price: None,
            currency: CurrencyCode::NGN,
            sku: format!("SKU-{title}"),
            stock_quantity: stock,
            images: vec![format!("https://cdn.example.com/{title}.jpg")],
            tags: Vec::new(),
            rating_avg: Decimal::ZERO,
            rating_count: 0,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn variant(product: &Product, variant_type: VariantType, value: &str) -> ProductVariant {
        ProductVariant {
            id: VariantId::generate(),
            product_id: product.id,
            variant_type,
            value: value.to_string(),
            stock_quantity: 10,
            sku: format!("{}-{value}", product.sku),
            additional_price: None,
        }
    }
}
