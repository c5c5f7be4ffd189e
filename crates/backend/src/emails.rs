//! Outgoing email queue.
//!
//! Emails are not sent from here. Rows inserted into `email_queue` are
//! picked up and delivered by a worker running next to the backend.

use std::fmt::Write as _;

use oja_core::order::Order;
use oja_core::Price;
use serde::Serialize;
use serde_json::json;
use tracing::instrument;

use crate::{Backend, BackendError};

const EMAIL_QUEUE: &str = "email_queue";

/// A row of the email queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub metadata: serde_json::Value,
}

/// Confirmation email for a placed order.
#[must_use]
pub fn order_confirmation_email(order: &Order) -> QueuedEmail {
    let currency = order.currency;
    let money = |amount| Price::new(amount, currency).display();

    let mut body = String::new();
    let _ = writeln!(body, "Hi {},", order.contact_info.first_name.trim());
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Thank you for your order. Order number: {}",
        order.order_number
    );
    let _ = writeln!(body);
    for item in &order.order_items {
        let _ = write!(body, "{} x {}", item.quantity, item.product_title);
        if !item.variant_selections.is_empty() {
            let _ = write!(body, " ({})", item.variant_selections.describe());
        }
        let _ = writeln!(body, " - {}", money(item.line_total()));
    }
    if !order.order_items.is_empty() {
        let _ = writeln!(body);
    }
    let _ = writeln!(body, "Subtotal: {}", money(order.subtotal));
    let _ = writeln!(body, "Tax: {}", money(order.tax_amount));
    let _ = writeln!(body, "Shipping: {}", money(order.shipping_fee));
    let _ = writeln!(body, "Total: {}", money(order.total_amount));
    let _ = writeln!(body);
    let _ = writeln!(body, "Delivering to: {}", order.delivery_address.one_line());
    let _ = writeln!(body, "Payment: {}", order.payment_method.label());

    QueuedEmail {
        to: order.customer_email.clone(),
        subject: format!("Order Confirmation - {}", order.order_number),
        body,
        metadata: json!({
            "type": "order_confirmation",
            "order_id": order.id,
            "order_number": order.order_number,
            "total_amount": order.total_amount,
        }),
    }
}

impl Backend {
    /// Queue an email for delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert is rejected.
    #[instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    pub async fn enqueue_email(&self, email: &QueuedEmail) -> Result<(), BackendError> {
        self.from(EMAIL_QUEUE)
            .insert::<_, serde_json::Value>(email)
            .await?;
        Ok(())
    }

    /// Queue the confirmation email for an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert is rejected.
    pub async fn enqueue_order_confirmation(&self, order: &Order) -> Result<(), BackendError> {
        self.enqueue_email(&order_confirmation_email(order)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order() -> Order {
        serde_json::from_value(json!({
            "id": "3f0c8a52-7b1e-4d2a-9c3b-5e6f7a8b9c0d",
            "order_number": "ORD-1720000000000",
            "status": "pending",
            "payment_status": "completed",
            "subtotal": "30000",
            "tax_amount": "2250",
            "shipping_fee": "2500",
            "total_amount": "34750",
            "customer_email": "chidi@example.com",
            "delivery_address": { "street": "4 Allen Avenue", "city": "Ikeja", "state": "Lagos" },
            "contact_info": { "first_name": "Chidi", "last_name": "Eze", "email": "chidi@example.com", "phone": "0803" },
            "payment_method": "paystack",
            "created_at": "2024-07-03T09:46:40Z",
            "updated_at": "2024-07-03T09:46:40Z",
            "order_items": [{
                "id": "8a7b6c5d-4e3f-4a1b-9c8d-7e6f5a4b3c2d",
                "order_id": "3f0c8a52-7b1e-4d2a-9c3b-5e6f7a8b9c0d",
                "product_id": "1b2c3d4e-5f60-4718-8a9b-0c1d2e3f4a5b",
                "product_title": "Kaftan",
                "quantity": 2,
                "unit_price": "15000",
                "variant_selections": { "size": "XL" }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_confirmation_email_contents() {
        let email = order_confirmation_email(&order());
        assert_eq!(email.to, "chidi@example.com");
        assert_eq!(email.subject, "Order Confirmation - ORD-1720000000000");
        assert!(email.body.contains("Order number: ORD-1720000000000"));
        assert!(email.body.contains("2 x Kaftan (Size: XL) - ₦30,000.00"));
        assert!(email.body.contains("Total: ₦34,750.00"));
        assert!(email.body.contains("4 Allen Avenue, Ikeja, Lagos, Nigeria"));
        assert_eq!(email.metadata["type"], "order_confirmation");
    }
}
