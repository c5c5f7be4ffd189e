//! Session-related types for admin authentication.
//!
//! Types stored in the session for authentication state.

use oja_backend::AuthSession;
use oja_core::UserId;
use oja_core::account::Profile;
use serde::{Deserialize, Serialize};

/// Session-stored admin identity.
///
/// Only users whose profile role is `admin` get one. Implements `Debug`
/// manually to redact the access token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentAdmin {
    /// Backend user ID.
    pub id: UserId,
    /// Admin's email address.
    pub email: String,
    /// Admin's display name.
    pub name: String,
    /// Backend access token, kept so sign-out can revoke it.
    pub access_token: String,
}

impl std::fmt::Debug for CurrentAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentAdmin")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl CurrentAdmin {
    /// Build from a fresh auth session and an admin profile.
    ///
    /// Returns `None` unless the profile carries the admin role.
    #[must_use]
    pub fn from_profile(session: &AuthSession, profile: &Profile) -> Option<Self> {
        if !profile.is_admin() || profile.user_id != session.user.id {
            return None;
        }
        let email = session.user.email.clone().unwrap_or_default();
        let name = profile.display_name();
        Some(Self {
            id: session.user.id,
            name: if name.is_empty() { email.clone() } else { name },
            email,
            access_token: session.access_token.clone(),
        })
    }
}

/// Session keys for admin authentication data.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const USER_ID: &str = "1d5f1c0e-2a4b-4c6d-8e9f-0a1b2c3d4e5f";

    fn auth_session() -> AuthSession {
        serde_json::from_value(serde_json::json!({
            "access_token": "access-abc",
            "refresh_token": "refresh-abc",
            "user": { "id": USER_ID, "email": "kemi@oja.ng" }
        }))
        .unwrap()
    }

    fn profile(role: &str, user_id: &str) -> Profile {
        serde_json::from_value(serde_json::json!({
            "id": "5a1e0c7d-0000-4000-8000-000000000001",
            "user_id": user_id,
            "first_name": "Kemi",
            "last_name": "Ade",
            "role": role,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_admin_profile_signs_in() {
        let admin = CurrentAdmin::from_profile(&auth_session(), &profile("admin", USER_ID)).unwrap();
        assert_eq!(admin.name, "Kemi Ade");
        assert_eq!(admin.email, "kemi@oja.ng");
    }

    #[test]
    fn test_customer_profile_is_refused() {
        assert!(CurrentAdmin::from_profile(&auth_session(), &profile("customer", USER_ID)).is_none());
        assert!(CurrentAdmin::from_profile(&auth_session(), &profile("vendor", USER_ID)).is_none());
    }

    #[test]
    fn test_profile_of_another_user_is_refused() {
        let other = "9e8d7c6b-5a4f-4e3d-8c2b-1a0f9e8d7c6b";
        assert!(CurrentAdmin::from_profile(&auth_session(), &profile("admin", other)).is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let admin = CurrentAdmin::from_profile(&auth_session(), &profile("admin", USER_ID)).unwrap();
        assert!(!format!("{admin:?}").contains("access-abc"));
    }
}
