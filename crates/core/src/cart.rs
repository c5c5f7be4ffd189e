//! Shopping cart state.
//!
//! A [`Cart`] is an ordered list of lines. Adding a product whose id and
//! variant selection match an existing line bumps that line's quantity
//! instead of appending a duplicate. Totals are never stored; they are
//! derived from the lines on every read so they cannot drift after a
//! mutation.
//!
//! Each line carries a [`ProductSnapshot`] taken when the product was added,
//! so the cart can be rendered and priced without going back to the catalog.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{Product, ProductDetail};
use crate::checkout::{OrderTotals, PricingPolicy};
use crate::types::{CartLineId, CurrencyCode, Price, ProductId, VariantType};

/// Errors from cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    #[error("{title} is out of stock")]
    OutOfStock { title: String },
    #[error("only {available} of {title} available, requested {requested}")]
    InsufficientStock {
        title: String,
        requested: u32,
        available: u32,
    },
    #[error("{variant_type} {value} is not offered for this product")]
    UnknownVariant {
        variant_type: VariantType,
        value: String,
    },
    #[error("{title} is priced in {found}, the cart is in {expected}")]
    CurrencyMismatch {
        title: String,
        expected: CurrencyCode,
        found: CurrencyCode,
    },
}

/// Chosen option per variant attribute, e.g. `size => M, color => Indigo`.
///
/// Backed by an ordered map so two selections made in different orders
/// compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantSelection(BTreeMap<VariantType, String>);

impl VariantSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the value for an attribute.
    #[must_use]
    pub fn with(mut self, variant_type: VariantType, value: impl Into<String>) -> Self {
        self.0.insert(variant_type, value.into());
        self
    }

    pub fn insert(&mut self, variant_type: VariantType, value: impl Into<String>) {
        self.0.insert(variant_type, value.into());
    }

    #[must_use]
    pub fn get(&self, variant_type: VariantType) -> Option<&str> {
        self.0.get(&variant_type).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VariantType, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Short label such as `Size: M / Color: Indigo`.
    #[must_use]
    pub fn describe(&self) -> String {
        self.iter()
            .map(|(t, v)| format!("{}: {v}", t.label()))
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

/// Product data captured when it is put in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub title: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    /// Sum of `additional_price` over the selected variants.
    #[serde(default)]
    pub variant_surcharge: Decimal,
    pub image: Option<String>,
    pub stock_quantity: u32,
    #[serde(default)]
    pub currency: CurrencyCode,
}

impl ProductSnapshot {
    /// Snapshot a product with no variant selection.
    #[must_use]
    pub fn of(product: &Product) -> Self {
        Self {
            product_id: product.id,
            title: product.title.clone(),
            price: product.price,
            discount_price: product.active_discount(),
            variant_surcharge: Decimal::ZERO,
            image: product.cover_image().map(str::to_string),
            stock_quantity: product.available_stock(),
            currency: product.currency,
        }
    }

    /// Snapshot a product for a particular variant selection.
    ///
    /// Selected variants add their surcharge to the unit price, and the
    /// sellable stock becomes the smallest of the product's and each selected
    /// variant's stock.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownVariant`] if a selected value is not one of
    /// the product's variants.
    pub fn for_selection(
        detail: &ProductDetail,
        selection: &VariantSelection,
    ) -> Result<Self, CartError> {
        let mut snapshot = Self::of(&detail.product);
        for (variant_type, value) in selection.iter() {
            let variant =
                detail
                    .variant(variant_type, value)
                    .ok_or_else(|| CartError::UnknownVariant {
                        variant_type,
                        value: value.to_string(),
                    })?;
            snapshot.variant_surcharge += variant.additional_price.unwrap_or_default();
            let variant_stock = u32::try_from(variant.stock_quantity).unwrap_or(0);
            snapshot.stock_quantity = snapshot.stock_quantity.min(variant_stock);
        }
        Ok(snapshot)
    }

    /// Price paid per unit, discount and variant surcharge applied.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        let base = self
            .discount_price
            .filter(|d| *d < self.price)
            .unwrap_or(self.price);
        base + self.variant_surcharge
    }
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartLineId,
    pub product: ProductSnapshot,
    pub quantity: u32,
    #[serde(default)]
    pub variant_selections: VariantSelection,
}

impl CartItem {
    /// A new line with a fresh id.
    #[must_use]
    pub fn new(product: ProductSnapshot, quantity: u32, variant_selections: VariantSelection) -> Self {
        Self {
            id: CartLineId::generate(),
            product,
            quantity,
            variant_selections,
        }
    }

    #[must_use]
    pub fn unit_price(&self) -> Price {
        Price::new(self.product.unit_price(), self.product.currency)
    }

    #[must_use]
    pub fn line_total(&self) -> Price {
        Price::new(
            self.product.unit_price() * Decimal::from(self.quantity),
            self.product.currency,
        )
    }

    fn same_line(&self, product_id: ProductId, selection: &VariantSelection) -> bool {
        self.product.product_id == product_id && self.variant_selections == *selection
    }
}

/// The shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add an item, merging with an existing line for the same product and
    /// variant selection. Returns the id of the line that now holds it.
    ///
    /// # Errors
    ///
    /// Rejects a zero quantity, an out-of-stock product, a product priced in
    /// another currency than the lines already in the cart, or a resulting
    /// line quantity above the snapshot's stock. The cart is unchanged on
    /// error.
    pub fn add(&mut self, item: CartItem) -> Result<CartLineId, CartError> {
        if item.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if !self.is_empty() && item.product.currency != self.currency() {
            return Err(CartError::CurrencyMismatch {
                title: item.product.title,
                expected: self.currency(),
                found: item.product.currency,
            });
        }
        if item.product.stock_quantity == 0 {
            return Err(CartError::OutOfStock {
                title: item.product.title,
            });
        }

        let existing = self
            .items
            .iter_mut()
            .find(|line| line.same_line(item.product.product_id, &item.variant_selections));

        match existing {
            Some(line) => {
                let requested = line.quantity.saturating_add(item.quantity);
                // The newer snapshot carries the fresher stock figure.
                check_stock(&item.product, requested)?;
                line.quantity = requested;
                line.product = item.product;
                Ok(line.id)
            }
            None => {
                check_stock(&item.product, item.quantity)?;
                let id = item.id;
                self.items.push(item);
                Ok(id)
            }
        }
    }

    /// Drop a line. Unknown ids are ignored.
    pub fn remove(&mut self, line_id: CartLineId) {
        self.items.retain(|line| line.id != line_id);
    }

    /// Set a line's quantity. Zero removes the line; unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InsufficientStock`] if the quantity exceeds the
    /// line's stock; the line keeps its old quantity.
    pub fn update_quantity(&mut self, line_id: CartLineId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            self.remove(line_id);
            return Ok(());
        }
        if let Some(line) = self.items.iter_mut().find(|line| line.id == line_id) {
            check_stock(&line.product, quantity)?;
            line.quantity = quantity;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// Currency of the cart, taken from the first line.
    #[must_use]
    pub fn currency(&self) -> CurrencyCode {
        self.items
            .first()
            .map(|line| line.product.currency)
            .unwrap_or_default()
    }

    /// Sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        let amount = self
            .items
            .iter()
            .map(|line| line.line_total().amount)
            .sum::<Decimal>();
        Price::new(amount, self.currency())
    }

    /// Subtotal, tax, shipping and grand total under `policy`.
    #[must_use]
    pub fn totals(&self, policy: &PricingPolicy) -> OrderTotals {
        if self.is_empty() {
            return OrderTotals::zero(self.currency());
        }
        OrderTotals::compute(self.subtotal(), policy)
    }
}

fn check_stock(product: &ProductSnapshot, requested: u32) -> Result<(), CartError> {
    if requested > product.stock_quantity {
        return Err(CartError::InsufficientStock {
            title: product.title.clone(),
            requested,
            available: product.stock_quantity,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{product, variant};

    fn snapshot(title: &str, price: i64, stock: i32) -> ProductSnapshot {
        ProductSnapshot::of(&product(title, price, stock))
    }

    #[test]
    fn same_product_and_selection_merges() {
        let mut cart = Cart::new();
        let shirt = snapshot("shirt", 10_000, 10);
        let m = VariantSelection::new().with(VariantType::Size, "M");

        let first = cart
            .add(CartItem::new(shirt.clone(), 1, m.clone()))
            .unwrap();
        let second = cart.add(CartItem::new(shirt, 2, m)).unwrap();

        assert_eq!(first, second);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn mixed_currencies_are_refused() {
        let mut cart = Cart::new();
        cart.add(CartItem::new(snapshot("wrap", 10_000, 5), 1, VariantSelection::new()))
            .unwrap();

        let mut imported = snapshot("sneakers", 100, 5);
        imported.currency = CurrencyCode::USD;
        let err = cart
            .add(CartItem::new(imported, 1, VariantSelection::new()))
            .unwrap_err();

        assert_eq!(
            err,
            CartError::CurrencyMismatch {
                title: "sneakers".to_string(),
                expected: CurrencyCode::NGN,
                found: CurrencyCode::USD,
            }
        );
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.subtotal(), Price::new(Decimal::new(10_000, 0), CurrencyCode::NGN));
    }

    #[test]
    fn selection_order_does_not_matter() {
        let mut cart = Cart::new();
        let dress = snapshot("dress", 10_000, 10);
        let a = VariantSelection::new()
            .with(VariantType::Size, "M")
            .with(VariantType::Color, "Red");
        let b = VariantSelection::new()
            .with(VariantType::Color, "Red")
            .with(VariantType::Size, "M");

        cart.add(CartItem::new(dress.clone(), 1, a)).unwrap();
        cart.add(CartItem::new(dress, 1, b)).unwrap();
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn different_selections_are_separate_lines() {
        let mut cart = Cart::new();
        let shirt = snapshot("shirt", 10_000, 10);
        cart.add(CartItem::new(
            shirt.clone(),
            1,
            VariantSelection::new().with(VariantType::Size, "M"),
        ))
        .unwrap();
        cart.add(CartItem::new(
            shirt,
            1,
            VariantSelection::new().with(VariantType::Size, "L"),
        ))
        .unwrap();
        assert_eq!(cart.items().len(), 2);
    }

    #[test]
    fn zero_quantity_update_removes_line() {
        let mut cart = Cart::new();
        let id = cart
            .add(CartItem::new(
                snapshot("bag", 5_000, 4),
                2,
                VariantSelection::new(),
            ))
            .unwrap();
        cart.update_quantity(id, 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn update_and_remove_ignore_unknown_lines() {
        let mut cart = Cart::new();
        cart.add(CartItem::new(
            snapshot("bag", 5_000, 4),
            1,
            VariantSelection::new(),
        ))
        .unwrap();
        let before = cart.clone();
        cart.update_quantity(CartLineId::generate(), 3).unwrap();
        cart.remove(CartLineId::generate());
        assert_eq!(cart, before);
    }

    #[test]
    fn stock_bounds_are_enforced() {
        let mut cart = Cart::new();
        let bag = snapshot("bag", 5_000, 3);

        assert_eq!(
            cart.add(CartItem::new(bag.clone(), 0, VariantSelection::new())),
            Err(CartError::InvalidQuantity)
        );

        let id = cart
            .add(CartItem::new(bag.clone(), 2, VariantSelection::new()))
            .unwrap();
        let err = cart
            .add(CartItem::new(bag, 2, VariantSelection::new()))
            .unwrap_err();
        assert!(matches!(
            err,
            CartError::InsufficientStock {
                requested: 4,
                available: 3,
                ..
            }
        ));
        assert_eq!(cart.items()[0].quantity, 2);

        assert!(cart.update_quantity(id, 5).is_err());
        assert_eq!(cart.items()[0].quantity, 2);

        let sold_out = snapshot("sold-out", 1_000, 0);
        assert!(matches!(
            cart.add(CartItem::new(sold_out, 1, VariantSelection::new())),
            Err(CartError::OutOfStock { .. })
        ));
    }

    #[test]
    fn totals_follow_every_mutation() {
        let policy = PricingPolicy::default();
        let mut cart = Cart::new();
        let id = cart
            .add(CartItem::new(
                snapshot("lamp", 20_000, 10),
                1,
                VariantSelection::new(),
            ))
            .unwrap();

        let totals = cart.totals(&policy);
        assert_eq!(totals.subtotal.amount, Decimal::new(20_000, 0));
        assert_eq!(totals.tax.amount, Decimal::new(1_500, 0));
        assert_eq!(totals.shipping.amount, Decimal::new(2_500, 0));
        assert_eq!(totals.total.amount, Decimal::new(24_000, 0));

        cart.update_quantity(id, 3).unwrap();
        let totals = cart.totals(&policy);
        assert_eq!(totals.subtotal.amount, Decimal::new(60_000, 0));
        assert_eq!(totals.shipping.amount, Decimal::ZERO);
        assert_eq!(totals.total.amount, Decimal::new(64_500, 0));

        cart.clear();
        let totals = cart.totals(&policy);
        assert!(cart.is_empty());
        assert_eq!(totals.total.amount, Decimal::ZERO);
        assert_eq!(totals.shipping.amount, Decimal::ZERO);
    }

    #[test]
    fn discounted_price_is_used() {
        let mut p = product("scarf", 8_000, 5);
        p.discount_price = Some(Decimal::new(6_000, 0));
        let mut cart = Cart::new();
        cart.add(CartItem::new(
            ProductSnapshot::of(&p),
            2,
            VariantSelection::new(),
        ))
        .unwrap();
        assert_eq!(cart.subtotal().amount, Decimal::new(12_000, 0));
    }

    #[test]
    fn variant_snapshot_adds_surcharge_and_caps_stock() {
        let p = product("sneaker", 30_000, 20);
        let mut big = variant(&p, VariantType::Size, "46");
        big.additional_price = Some(Decimal::new(2_000, 0));
        big.stock_quantity = 2;
        let detail = ProductDetail {
            variants: vec![big, variant(&p, VariantType::Size, "42")],
            gallery: Vec::new(),
            product: p,
        };

        let selection = VariantSelection::new().with(VariantType::Size, "46");
        let snap = ProductSnapshot::for_selection(&detail, &selection).unwrap();
        assert_eq!(snap.unit_price(), Decimal::new(32_000, 0));
        assert_eq!(snap.stock_quantity, 2);

        let missing = VariantSelection::new().with(VariantType::Color, "Gold");
        assert!(matches!(
            ProductSnapshot::for_selection(&detail, &missing),
            Err(CartError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn cart_survives_session_serialization() {
        let mut cart = Cart::new();
        cart.add(CartItem::new(
            snapshot("mug", 3_000, 9),
            2,
            VariantSelection::new().with(VariantType::Color, "Blue"),
        ))
        .unwrap();
        let json = serde_json::to_value(&cart).unwrap();
        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
