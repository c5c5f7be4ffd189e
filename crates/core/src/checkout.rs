//! Checkout pricing and customer details.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::types::{CurrencyCode, Email, EmailError, PaymentMethod, Price};

/// Tax and shipping rules applied to a cart subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Fraction of the subtotal charged as tax (0.075 = 7.5%).
    pub tax_rate: Decimal,
    /// Subtotals strictly above this ship free.
    pub free_shipping_over: Decimal,
    /// Flat shipping fee below the threshold.
    pub shipping_fee: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(75, 3),
            free_shipping_over: Decimal::new(50_000, 0),
            shipping_fee: Decimal::new(2_500, 0),
        }
    }
}

impl PricingPolicy {
    /// Tax on a subtotal, rounded to two decimal places.
    #[must_use]
    pub fn tax_on(&self, subtotal: Decimal) -> Decimal {
        (subtotal * self.tax_rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Shipping for a subtotal. Nothing to ship means no fee.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal <= Decimal::ZERO || subtotal > self.free_shipping_over {
            Decimal::ZERO
        } else {
            self.shipping_fee
        }
    }
}

/// Money breakdown of a cart or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Price,
    pub tax: Price,
    pub shipping: Price,
    pub discount: Price,
    pub total: Price,
}

impl OrderTotals {
    /// All-zero totals.
    #[must_use]
    pub const fn zero(currency: CurrencyCode) -> Self {
        Self {
            subtotal: Price::zero(currency),
            tax: Price::zero(currency),
            shipping: Price::zero(currency),
            discount: Price::zero(currency),
            total: Price::zero(currency),
        }
    }

    /// Derive tax, shipping and total from a subtotal.
    #[must_use]
    pub fn compute(subtotal: Price, policy: &PricingPolicy) -> Self {
        let currency = subtotal.currency_code;
        let tax = policy.tax_on(subtotal.amount);
        let shipping = policy.shipping_for(subtotal.amount);
        Self {
            subtotal,
            tax: Price::new(tax, currency),
            shipping: Price::new(shipping, currency),
            discount: Price::zero(currency),
            total: Price::new(subtotal.amount + tax + shipping, currency),
        }
    }

    /// Whether shipping was waived.
    #[must_use]
    pub fn ships_free(&self) -> bool {
        self.shipping.amount.is_zero()
    }
}

/// Human-facing order reference, `ORD-<unix millis>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const PREFIX: &'static str = "ORD-";

    /// Number for an order placed at `now`.
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self(format!("{}{}", Self::PREFIX, now.timestamp_millis()))
    }

    /// Accept a customer-typed reference, tolerating case and padding.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim().to_ascii_uppercase();
        let digits = input.strip_prefix(Self::PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self(input))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Countries the store delivers to.
pub const DELIVERY_COUNTRIES: &[&str] = &["Nigeria", "Ghana", "Kenya"];

/// Who to contact about an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl ContactInfo {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// Where to deliver an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "Nigeria".to_string()
}

impl Default for DeliveryAddress {
    fn default() -> Self {
        Self {
            street: String::new(),
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            country: default_country(),
        }
    }
}

impl DeliveryAddress {
    /// One-line rendering for emails and order pages.
    #[must_use]
    pub fn one_line(&self) -> String {
        [
            self.street.as_str(),
            self.city.as_str(),
            self.state.as_str(),
            self.postal_code.as_str(),
            self.country.as_str(),
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Errors from validating a checkout submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
    #[error("we do not deliver to {0}")]
    UnsupportedCountry(String),
}

impl CheckoutError {
    /// Short code used in `?error=` redirects.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyCart => "empty_cart",
            Self::MissingField(_) => "missing_field",
            Self::InvalidEmail(_) => "invalid_email",
            Self::UnsupportedCountry(_) => "unsupported_country",
        }
    }
}

/// Everything the customer fills in on the checkout page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutDetails {
    pub contact: ContactInfo,
    pub address: DeliveryAddress,
    pub payment_method: PaymentMethod,
}

impl CheckoutDetails {
    /// Check required fields and return the normalized email.
    ///
    /// # Errors
    ///
    /// Returns the first missing field, an invalid email, or an unsupported
    /// delivery country.
    pub fn validate(&self) -> Result<Email, CheckoutError> {
        let required = [
            ("first name", &self.contact.first_name),
            ("last name", &self.contact.last_name),
            ("email", &self.contact.email),
            ("phone", &self.contact.phone),
            ("street address", &self.address.street),
            ("city", &self.address.city),
            ("state", &self.address.state),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(CheckoutError::MissingField(name));
        }
        let email = Email::parse(&self.contact.email)?;
        if !DELIVERY_COUNTRIES.contains(&self.address.country.as_str()) {
            return Err(CheckoutError::UnsupportedCountry(self.address.country.clone()));
        }
        Ok(email)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn naira(amount: i64) -> Price {
        Price::new(Decimal::new(amount, 0), CurrencyCode::NGN)
    }

    #[test]
    fn below_threshold_pays_shipping() {
        let totals = OrderTotals::compute(naira(10_000), &PricingPolicy::default());
        assert_eq!(totals.tax.amount, Decimal::new(750, 0));
        assert_eq!(totals.shipping.amount, Decimal::new(2_500, 0));
        assert_eq!(totals.total.amount, Decimal::new(13_250, 0));
    }

    #[test]
    fn threshold_is_exclusive() {
        let policy = PricingPolicy::default();
        let at = OrderTotals::compute(naira(50_000), &policy);
        assert_eq!(at.shipping.amount, Decimal::new(2_500, 0));

        let above = OrderTotals::compute(naira(50_001), &policy);
        assert!(above.ships_free());
        assert_eq!(above.total.amount, Decimal::new(5_375_108, 2));
    }

    #[test]
    fn tax_rounds_to_kobo() {
        let subtotal = Price::new(Decimal::new(3_333, 2), CurrencyCode::NGN);
        let totals = OrderTotals::compute(subtotal, &PricingPolicy::default());
        // 33.33 * 0.075 = 2.49975
        assert_eq!(totals.tax.amount, Decimal::new(250, 2));
    }

    #[test]
    fn zero_subtotal_is_all_zero() {
        let totals = OrderTotals::compute(naira(0), &PricingPolicy::default());
        assert_eq!(totals, OrderTotals::zero(CurrencyCode::NGN));
    }

    #[test]
    fn order_numbers_use_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(OrderNumber::generate(at).as_str(), "ORD-1700000000123");
        assert_eq!(
            OrderNumber::parse(" ord-1700000000123 ").unwrap().as_str(),
            "ORD-1700000000123"
        );
        assert!(OrderNumber::parse("ORD-").is_none());
        assert!(OrderNumber::parse("12345").is_none());
    }

    fn details() -> CheckoutDetails {
        CheckoutDetails {
            contact: ContactInfo {
                first_name: "Ada".to_string(),
                last_name: "Obi".to_string(),
                email: "Ada@Example.com".to_string(),
                phone: "+2348012345678".to_string(),
            },
            address: DeliveryAddress {
                street: "12 Marina".to_string(),
                city: "Lagos".to_string(),
                state: "Lagos".to_string(),
                ..DeliveryAddress::default()
            },
            payment_method: PaymentMethod::Paystack,
        }
    }

    #[test]
    fn validate_normalizes_email() {
        assert_eq!(details().validate().unwrap().as_str(), "ada@example.com");
    }

    #[test]
    fn validate_reports_first_gap() {
        let mut d = details();
        d.contact.phone = "  ".to_string();
        assert_eq!(d.validate(), Err(CheckoutError::MissingField("phone")));

        let mut d = details();
        d.contact.email = "nope".to_string();
        assert!(matches!(d.validate(), Err(CheckoutError::InvalidEmail(_))));

        let mut d = details();
        d.address.country = "Atlantis".to_string();
        assert_eq!(d.validate().unwrap_err().code(), "unsupported_country");
    }

    #[test]
    fn address_one_line_skips_blanks() {
        let d = details();
        assert_eq!(d.address.one_line(), "12 Marina, Lagos, Lagos, Nigeria");
    }
}
