//! Plain records stored by the backend: coupons, reviews, wishlists and
//! contact messages.
//!
//! The storefront does not validate coupons, aggregate ratings or manage
//! wishlists. These types exist so rows can be read and written faithfully.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{
    ContactMessageId, ContactMessageStatus, CouponId, Email, EmailError, OrderId, ProductId,
    ReviewId, UserId, WishlistId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_purchase_amount: Option<Decimal>,
    #[serde(default)]
    pub max_discount_amount: Option<Decimal>,
    #[serde(default)]
    pub usage_limit: Option<i32>,
    #[serde(default)]
    pub current_usage: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rating must be between 1 and 5, got {0}")]
pub struct InvalidRating(pub u8);

/// A product review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    #[serde(default)]
    pub order_id: Option<OrderId>,
    pub rating: u8,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub verified_purchase: bool,
    #[serde(default)]
    pub helpful_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Review to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewReview {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub rating: u8,
    pub title: String,
    pub comment: String,
}

impl NewReview {
    /// # Errors
    ///
    /// Returns [`InvalidRating`] unless `rating` is 1 to 5.
    pub fn new(
        product_id: ProductId,
        user_id: UserId,
        rating: u8,
        title: impl Into<String>,
        comment: impl Into<String>,
    ) -> Result<Self, InvalidRating> {
        if !(1..=5).contains(&rating) {
            return Err(InvalidRating(rating));
        }
        Ok(Self {
            product_id,
            user_id,
            order_id: None,
            rating,
            title: title.into(),
            comment: comment.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wishlist {
    pub id: WishlistId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub created_at: DateTime<Utc>,
}

/// A message sent through the contact form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: ContactMessageId,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub status: ContactMessageStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactMessageError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error(transparent)]
    InvalidEmail(#[from] EmailError),
}

/// Contact form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewContactMessage {
    pub name: String,
    pub email: Email,
    pub subject: String,
    pub message: String,
    pub status: ContactMessageStatus,
}

impl NewContactMessage {
    /// # Errors
    ///
    /// Rejects blank name or message and malformed emails. A blank subject
    /// becomes "General enquiry".
    pub fn new(
        name: &str,
        email: &str,
        subject: &str,
        message: &str,
    ) -> Result<Self, ContactMessageError> {
        if name.trim().is_empty() {
            return Err(ContactMessageError::MissingField("name"));
        }
        if message.trim().is_empty() {
            return Err(ContactMessageError::MissingField("message"));
        }
        let subject = match subject.trim() {
            "" => "General enquiry",
            s => s,
        };
        Ok(Self {
            name: name.trim().to_string(),
            email: Email::parse(email)?,
            subject: subject.to_string(),
            message: message.trim().to_string(),
            status: ContactMessageStatus::New,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ratings_outside_one_to_five_are_rejected() {
        let p = ProductId::generate();
        let u = UserId::generate();
        assert!(NewReview::new(p, u, 5, "Great", "").is_ok());
        assert_eq!(NewReview::new(p, u, 0, "", "").unwrap_err(), InvalidRating(0));
        assert_eq!(NewReview::new(p, u, 6, "", "").unwrap_err(), InvalidRating(6));
    }

    #[test]
    fn contact_message_defaults_subject() {
        let msg = NewContactMessage::new("Tola", "tola@example.com", " ", "Hello").unwrap();
        assert_eq!(msg.subject, "General enquiry");
        assert_eq!(msg.status, ContactMessageStatus::New);
        assert!(matches!(
            NewContactMessage::new("Tola", "tola@example.com", "Hi", "  "),
            Err(ContactMessageError::MissingField("message"))
        ));
    }
}
