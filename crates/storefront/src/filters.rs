//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Turns an `?error=` code into a sentence for the customer.
///
/// Usage in templates: `{{ code|error_message }}`
#[askama::filter_fn]
pub fn error_message(code: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(describe_error(&code.to_string()))
}

/// Message for an error code. Unknown codes get a generic message.
#[must_use]
pub fn describe_error(code: &str) -> &'static str {
    match code {
        "credentials" => "Invalid email or password.",
        "session" => "Your session could not be saved. Please try again.",
        "password_mismatch" => "Passwords do not match.",
        "password_too_short" => "Password must be at least 8 characters.",
        "email_taken" => "An account with this email already exists.",
        "invalid_email" => "Please enter a valid email address.",
        "missing_field" => "Please fill in all required fields.",
        "unsupported_country" => "We do not deliver to that country yet.",
        "empty_cart" => "Your cart is empty.",
        "out_of_stock" => "That item is out of stock.",
        "insufficient_stock" => "Not enough stock for that quantity.",
        "invalid_quantity" => "Quantity must be at least 1.",
        "unknown_variant" => "Please choose a valid option.",
        "currency_mismatch" => "That item is priced in another currency. Check out your cart first.",
        "order_failed" => "We could not place your order. Please try again.",
        "payment_failed" => "Payment could not be completed. Your cart has been kept.",
        "payment_declined" => "Your payment was declined. Your cart has been kept.",
        "payment_reference" => "We could not match that payment to your order.",
        "invalid_link" => "That link is invalid or has expired.",
        "not_found" => "We could not find an order with those details.",
        "rate_limited" => "Too many attempts. Please wait a minute and try again.",
        "profile" => "Your profile could not be saved. Please try again.",
        "contact" => "Your message could not be sent. Please try again.",
        _ => "Something went wrong. Please try again.",
    }
}

/// Turns a `?success=` code into a sentence for the customer.
///
/// Usage in templates: `{{ code|success_message }}`
#[askama::filter_fn]
pub fn success_message(code: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(match code.to_string().as_str() {
        "sent" => "If an account exists for that email, a reset link is on its way.",
        "password_reset" => "Your password has been changed. Please sign in.",
        "updated" => "Your profile has been updated.",
        "contact" => "Thanks for reaching out. We will reply within two working days.",
        _ => "Done.",
    })
}
