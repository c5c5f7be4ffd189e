//! Errors returned by the backend client.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {}", .body.describe())]
    Api {
        /// HTTP status code.
        status: u16,
        /// Parsed error body.
        body: ApiErrorBody,
    },

    /// Response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// No row matched a single-row query.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The auth service rejected the request (bad credentials, expired
    /// token, weak password, ...).
    #[error("Auth error: {0}")]
    Auth(String),

    /// An update or delete was issued without any row filter.
    #[error("refusing to {0} every row of {1}")]
    UnfilteredMutation(&'static str, String),
}

impl BackendError {
    /// Whether this error means the requested row does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self, Self::Api { status: 404, .. })
    }

    /// Whether the caller's token was rejected.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }
}

/// Error body returned by the table and storage APIs.
///
/// The auth API uses different field names for the same idea, so every
/// field is optional and [`ApiErrorBody::describe`] picks the first one set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    /// Raw body, kept when it was not JSON.
    #[serde(skip)]
    pub raw: Option<String>,
}

impl ApiErrorBody {
    /// Parse an error response body, falling back to the raw text.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_else(|_| Self {
            raw: Some(text.chars().take(200).collect()),
            ..Self::default()
        })
    }

    /// Most specific human-readable message available.
    #[must_use]
    pub fn describe(&self) -> String {
        let message = self
            .error_description
            .as_deref()
            .or(self.msg.as_deref())
            .or(self.message.as_deref())
            .or(self.error.as_deref())
            .or(self.raw.as_deref())
            .unwrap_or("(no error details provided)");

        match (&self.details, &self.hint) {
            (Some(details), _) if !details.is_empty() => format!("{message} ({details})"),
            (_, Some(hint)) if !hint.is_empty() => format!("{message} (hint: {hint})"),
            _ => message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = BackendError::NotFound("products 42".to_string());
        assert_eq!(err.to_string(), "Not found: products 42");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_table_error_body() {
        let body = ApiErrorBody::parse(
            r#"{"code":"23505","details":"Key (sku)=(A1) already exists.","hint":null,"message":"duplicate key value violates unique constraint"}"#,
        );
        let err = BackendError::Api { status: 409, body };
        assert_eq!(
            err.to_string(),
            "backend returned 409: duplicate key value violates unique constraint (Key (sku)=(A1) already exists.)"
        );
    }

    #[test]
    fn test_auth_error_body_prefers_description() {
        let body = ApiErrorBody::parse(
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(body.describe(), "Invalid login credentials");
    }

    #[test]
    fn test_non_json_body_is_kept() {
        let body = ApiErrorBody::parse("<html>Bad Gateway</html>");
        assert_eq!(body.describe(), "<html>Bad Gateway</html>");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = BackendError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }
}
