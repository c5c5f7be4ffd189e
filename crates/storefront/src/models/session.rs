//! Session-related types.
//!
//! The cart, the signed-in customer and an in-flight gateway payment all
//! live in the browser session.

use chrono::{DateTime, Utc};
use oja_backend::AuthSession;
use oja_core::account::Profile;
use oja_core::cart::Cart;
use oja_core::{OrderId, PaymentMethod, ProfileRole, UserId};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

/// Session keys.
pub mod keys {
    /// Key for the shopping cart.
    pub const CART: &str = "cart";

    /// Key for the current logged-in customer.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for an order waiting on a gateway redirect.
    pub const PENDING_CHECKOUT: &str = "pending_checkout";

    /// Key for the order this browser last placed.
    pub const LAST_ORDER: &str = "last_order";
}

/// Session-stored customer identity and backend tokens.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: ProfileRole,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: Option<i64>,
}

impl std::fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl CurrentUser {
    /// Build from a fresh auth session and the user's profile, if any.
    ///
    /// Without a profile the names come from the sign-up metadata.
    #[must_use]
    pub fn new(session: &AuthSession, profile: Option<&Profile>) -> Self {
        let user = &session.user;
        let meta = |key: &str| user.metadata_str(key).unwrap_or_default().to_string();
        Self {
            id: user.id,
            email: user.email.clone().unwrap_or_default(),
            first_name: profile.map_or_else(|| meta("first_name"), |p| p.first_name.clone()),
            last_name: profile.map_or_else(|| meta("last_name"), |p| p.last_name.clone()),
            phone: profile.map(|p| p.phone.clone()).unwrap_or_default(),
            role: profile.map(|p| p.role).unwrap_or_default(),
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: session.expires_at,
        }
    }

    /// Replace the tokens after a refresh.
    pub fn refresh(&mut self, session: &AuthSession) {
        self.access_token.clone_from(&session.access_token);
        self.refresh_token.clone_from(&session.refresh_token);
        self.expires_at = session.expires_at;
    }

    /// Copy profile fields after an edit.
    pub fn apply_profile(&mut self, profile: &Profile) {
        self.first_name.clone_from(&profile.first_name);
        self.last_name.clone_from(&profile.last_name);
        self.phone.clone_from(&profile.phone);
        self.role = profile.role;
    }

    /// Whether the access token expires within `leeway_secs` of `now`.
    #[must_use]
    pub fn expires_soon(&self, now: DateTime<Utc>, leeway_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at - leeway_secs <= now.timestamp())
    }

    /// Name to greet the customer with.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

/// An order whose payment is being completed on the gateway's page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCheckout {
    pub order_id: OrderId,
    pub order_number: String,
    pub payment_method: PaymentMethod,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// The session cart, or an empty one.
pub async fn load_cart(session: &Session) -> Cart {
    session
        .get::<Cart>(keys::CART)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Store the cart in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CART, cart).await
}

/// Remember an order waiting on the gateway.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_pending_checkout(
    session: &Session,
    pending: &PendingCheckout,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::PENDING_CHECKOUT, pending).await
}

/// Take the order waiting on the gateway, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn take_pending_checkout(
    session: &Session,
) -> Result<Option<PendingCheckout>, tower_sessions::session::Error> {
    session.remove::<PendingCheckout>(keys::PENDING_CHECKOUT).await
}

/// Finish a checkout: empty the cart and remember the order so its
/// confirmation page can be shown to this browser.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn complete_checkout(
    session: &Session,
    order_id: OrderId,
) -> Result<(), tower_sessions::session::Error> {
    save_cart(session, &Cart::new()).await?;
    session.insert(keys::LAST_ORDER, order_id).await
}

/// The order this browser last placed, if any.
pub async fn last_order(session: &Session) -> Option<OrderId> {
    session.get::<OrderId>(keys::LAST_ORDER).await.ok().flatten()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn auth_session() -> AuthSession {
        serde_json::from_value(serde_json::json!({
            "access_token": "access-abc",
            "refresh_token": "refresh-abc",
            "expires_in": 3600,
            "expires_at": 1_720_003_600,
            "user": {
                "id": "1d5f1c0e-2a4b-4c6d-8e9f-0a1b2c3d4e5f",
                "email": "ada@example.com",
                "user_metadata": { "first_name": "Ada", "last_name": "Obi" }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_current_user_falls_back_to_signup_metadata() {
        let user = CurrentUser::new(&auth_session(), None);
        assert_eq!(user.display_name(), "Ada Obi");
        assert_eq!(user.role, ProfileRole::Customer);
    }

    #[test]
    fn test_current_user_debug_redacts_tokens() {
        let debug_output = format!("{:?}", CurrentUser::new(&auth_session(), None));
        assert!(debug_output.contains("ada@example.com"));
        assert!(!debug_output.contains("access-abc"));
        assert!(!debug_output.contains("refresh-abc"));
    }

    #[test]
    fn test_expires_soon() {
        let user = CurrentUser::new(&auth_session(), None);
        let early = Utc.timestamp_opt(1_720_000_000, 0).unwrap();
        let late = Utc.timestamp_opt(1_720_003_550, 0).unwrap();
        assert!(!user.expires_soon(early, 60));
        assert!(user.expires_soon(late, 60));
    }
}
