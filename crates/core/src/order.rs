//! Orders and the payload built from a cart at checkout.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::{Cart, VariantSelection};
use crate::checkout::{
    CheckoutDetails, CheckoutError, ContactInfo, DeliveryAddress, OrderNumber, OrderTotals,
    PricingPolicy,
};
use crate::types::{
    CurrencyCode, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, Price,
    ProductId, UserId,
};

/// An order row, optionally with its items embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_fee: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: String,
    pub delivery_address: DeliveryAddress,
    pub contact_info: ContactInfo,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
}

impl Order {
    #[must_use]
    pub const fn total(&self) -> Price {
        Price::new(self.total_amount, self.currency)
    }

    #[must_use]
    pub fn totals(&self) -> OrderTotals {
        let c = self.currency;
        OrderTotals {
            subtotal: Price::new(self.subtotal, c),
            tax: Price::new(self.tax_amount, c),
            shipping: Price::new(self.shipping_fee, c),
            discount: Price::new(self.discount_amount, c),
            total: Price::new(self.total_amount, c),
        }
    }

    /// Units across all embedded items.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.order_items.iter().map(|item| item.quantity).sum()
    }

    /// Whether `email` placed this order. Used to let guests view their own
    /// orders by number.
    #[must_use]
    pub fn placed_by(&self, email: &str) -> bool {
        self.customer_email.eq_ignore_ascii_case(email.trim())
    }
}

/// A line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_title: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub product_image: Option<String>,
    #[serde(default)]
    pub variant_selections: VariantSelection,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Order row to insert. Items are inserted separately once the order id is
/// known, so they are skipped when serializing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_fee: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: CurrencyCode,
    pub customer_email: String,
    pub customer_phone: String,
    pub delivery_address: DeliveryAddress,
    pub contact_info: ContactInfo,
    pub payment_method: PaymentMethod,
    #[serde(skip)]
    pub items: Vec<NewOrderItem>,
}

/// Order item to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_title: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub product_image: Option<String>,
    pub variant_selections: VariantSelection,
}

impl NewOrderItem {
    /// Attach the item to a created order.
    #[must_use]
    pub fn for_order(&self, order_id: OrderId) -> NewOrderItemRow<'_> {
        NewOrderItemRow {
            order_id,
            item: self,
        }
    }
}

/// Serialized form of an order item, with its order id.
#[derive(Debug, Serialize)]
pub struct NewOrderItemRow<'a> {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub item: &'a NewOrderItem,
}

impl NewOrder {
    /// Build the order payload for a cart.
    ///
    /// The order starts `pending` for both fulfillment and payment. Totals
    /// are derived from the cart under `policy`.
    ///
    /// # Errors
    ///
    /// Rejects an empty cart and anything [`CheckoutDetails::validate`]
    /// rejects.
    pub fn from_cart(
        cart: &Cart,
        details: &CheckoutDetails,
        user_id: Option<UserId>,
        policy: &PricingPolicy,
        now: DateTime<Utc>,
    ) -> Result<Self, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let email = details.validate()?;
        let totals = cart.totals(policy);

        let mut contact_info = details.contact.clone();
        contact_info.email = email.as_str().to_string();

        let items = cart
            .items()
            .iter()
            .map(|line| NewOrderItem {
                product_id: line.product.product_id,
                product_title: line.product.title.clone(),
                quantity: line.quantity,
                unit_price: line.product.unit_price(),
                product_image: line.product.image.clone(),
                variant_selections: line.variant_selections.clone(),
            })
            .collect();

        Ok(Self {
            user_id,
            order_number: OrderNumber::generate(now),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            subtotal: totals.subtotal.amount,
            tax_amount: totals.tax.amount,
            shipping_fee: totals.shipping.amount,
            discount_amount: totals.discount.amount,
            total_amount: totals.total.amount,
            currency: cart.currency(),
            customer_email: email.into_inner(),
            customer_phone: details.contact.phone.trim().to_string(),
            delivery_address: details.address.clone(),
            contact_info,
            payment_method: details.payment_method,
            items,
        })
    }

    #[must_use]
    pub const fn total(&self) -> Price {
        Price::new(self.total_amount, self.currency)
    }
}

/// Filters for the admin order list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilters {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::cart::{CartItem, ProductSnapshot};
    use crate::catalog::fixtures::product;
    use crate::types::VariantType;

    fn details() -> CheckoutDetails {
        CheckoutDetails {
            contact: ContactInfo {
                first_name: "Chidi".to_string(),
                last_name: "Eze".to_string(),
                email: "CHIDI@example.com".to_string(),
                phone: " 08030000000 ".to_string(),
            },
            address: DeliveryAddress {
                street: "4 Allen Avenue".to_string(),
                city: "Ikeja".to_string(),
                state: "Lagos".to_string(),
                ..DeliveryAddress::default()
            },
            payment_method: PaymentMethod::Stripe,
        }
    }

    #[test]
    fn from_cart_carries_totals_and_items() {
        let mut cart = Cart::new();
        cart.add(CartItem::new(
            ProductSnapshot::of(&product("kaftan", 15_000, 5)),
            2,
            VariantSelection::new().with(VariantType::Size, "XL"),
        ))
        .unwrap();
        let now = Utc.timestamp_millis_opt(1_720_000_000_000).unwrap();

        let order =
            NewOrder::from_cart(&cart, &details(), None, &PricingPolicy::default(), now).unwrap();

        assert_eq!(order.order_number.as_str(), "ORD-1720000000000");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.subtotal, Decimal::new(30_000, 0));
        assert_eq!(order.tax_amount, Decimal::new(2_250, 0));
        assert_eq!(order.shipping_fee, Decimal::new(2_500, 0));
        assert_eq!(order.total_amount, Decimal::new(34_750, 0));
        assert_eq!(order.customer_email, "chidi@example.com");
        assert_eq!(order.customer_phone, "08030000000");
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(
            order.items[0].variant_selections.get(VariantType::Size),
            Some("XL")
        );
    }

    #[test]
    fn empty_cart_is_rejected() {
        let err = NewOrder::from_cart(
            &Cart::new(),
            &details(),
            None,
            &PricingPolicy::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, CheckoutError::EmptyCart);
    }

    #[test]
    fn order_payload_omits_items_and_rows_carry_order_id() {
        let mut cart = Cart::new();
        cart.add(CartItem::new(
            ProductSnapshot::of(&product("cap", 2_000, 5)),
            1,
            VariantSelection::new(),
        ))
        .unwrap();
        let order =
            NewOrder::from_cart(&cart, &details(), None, &PricingPolicy::default(), Utc::now())
                .unwrap();

        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("items").is_none());
        assert_eq!(json["payment_method"], "stripe");

        let order_id = OrderId::generate();
        let row = serde_json::to_value(order.items[0].for_order(order_id)).unwrap();
        assert_eq!(row["order_id"], order_id.to_string());
        assert_eq!(row["product_title"], "cap");
    }
}
