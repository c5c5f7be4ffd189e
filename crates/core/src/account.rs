//! Customer profiles and saved addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AddressId, AddressType, ProfileId, ProfileRole, UserId};

/// Profile row, one per auth user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub user_id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role: ProfileRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        name.trim().to_string()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == ProfileRole::Admin
    }
}

/// Profile created right after sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProfile {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: ProfileRole,
}

/// Fields a customer may change on their own profile. Role is not one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.avatar_url.is_none()
    }
}

/// Address book entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    pub street_address: String,
    pub city: String,
    pub state_province: String,
    #[serde(default)]
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub address_type: AddressType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Address book entry to insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddress {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub street_address: String,
    pub city: String,
    pub state_province: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub address_type: AddressType,
}

/// Address row with its owner.
#[derive(Debug, Serialize)]
pub struct NewAddressRow<'a> {
    pub user_id: UserId,
    #[serde(flatten)]
    pub address: &'a NewAddress,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn profile_defaults_to_customer() {
        let json = serde_json::json!({
            "id": "5a1f0a36-0c7e-4b43-9a44-8d2b4e7f0c11",
            "user_id": "9b2e3c4d-5f60-4718-8a9b-0c1d2e3f4a5b",
            "first_name": "Ngozi",
            "created_at": "2025-03-01T12:00:00Z",
            "updated_at": "2025-03-01T12:00:00Z"
        });
        let profile: Profile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.role, ProfileRole::Customer);
        assert!(!profile.is_admin());
        assert_eq!(profile.display_name(), "Ngozi");
    }

    #[test]
    fn update_skips_unset_fields() {
        let update = ProfileUpdate {
            phone: Some("0809".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(!update.is_empty());
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "phone": "0809" }));
    }
}
