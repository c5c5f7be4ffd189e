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

/// Turns an `?error=` code into a message.
///
/// Usage in templates: `{{ code|error_message }}`
#[askama::filter_fn]
pub fn error_message(code: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(describe_error(&code.to_string()))
}

/// Message for an error code.
#[must_use]
pub fn describe_error(code: &str) -> &'static str {
    match code {
        "credentials" => "Invalid email or password.",
        "forbidden" => "This account does not have admin access.",
        "session" => "Could not start a session. Please try again.",
        "missing_title" => "Title is required.",
        "negative_price" => "Price cannot be negative.",
        "discount_not_lower" => "Discount price must be below the list price.",
        "negative_stock" => "Stock quantity cannot be negative.",
        "invalid_number" => "Price and stock must be numbers.",
        "invalid_variant" => "Variants must be written as type:value:stock[:extra price].",
        "invalid_status" => "Unknown status.",
        "invalid_transition" => "Orders can only move forward, or be cancelled before delivery.",
        "invalid_image" => "Only image files can be uploaded.",
        "invalid_category" => "Unknown category.",
        "invalid_currency" => "Unknown currency.",
        "invalid_date" => "Dates must be in YYYY-MM-DD format.",
        "upload" => "The image could not be uploaded.",
        "save" => "The change could not be saved. Please try again.",
        _ => "Something went wrong. Please try again.",
    }
}

/// Turns a `?success=` code into a message.
///
/// Usage in templates: `{{ code|success_message }}`
#[askama::filter_fn]
pub fn success_message(code: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(match code.to_string().as_str() {
        "created" => "Product created.",
        "updated" => "Product updated.",
        "deleted" => "Product deleted.",
        "status" => "Order status updated.",
        "payment" => "Payment status updated.",
        _ => "Saved.",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_form_code_has_its_own_message() {
        let generic = describe_error("nonsense");
        for code in [
            "credentials",
            "forbidden",
            "missing_title",
            "invalid_variant",
            "invalid_transition",
            "invalid_currency",
            "upload",
        ] {
            assert_ne!(describe_error(code), generic, "{code}");
        }
    }
}
