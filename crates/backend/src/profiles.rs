//! Profile and address book queries.

use oja_core::account::{Address, NewAddress, NewAddressRow, NewProfile, Profile, ProfileUpdate};
use oja_core::{AddressId, UserId};
use serde_json::json;
use tracing::instrument;

use crate::rest::Stamped;
use crate::{Backend, BackendError};

const PROFILES: &str = "profiles";
const ADDRESSES: &str = "addresses";

impl Backend {
    /// The profile of an auth user, if one was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, BackendError> {
        self.from(PROFILES)
            .eq("user_id", user_id)
            .maybe_single()
            .await
    }

    /// Create the profile row for a new user.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert is rejected.
    #[instrument(skip(self, profile), fields(user_id = %profile.user_id))]
    pub async fn create_profile(&self, profile: &NewProfile) -> Result<Profile, BackendError> {
        self.from(PROFILES)
            .insert::<_, Profile>(profile)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound("inserted profile".to_string()))
    }

    /// Update a user's own profile fields.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if the user has no profile.
    #[instrument(skip(self, changes), fields(user_id = %user_id))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        changes: &ProfileUpdate,
    ) -> Result<Profile, BackendError> {
        self.from(PROFILES)
            .eq("user_id", user_id)
            .update::<_, Profile>(&Stamped::now(changes))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("profile for user {user_id}")))
    }

    // =========================================================================
    // Address Book
    // =========================================================================

    /// A user's saved addresses, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn get_user_addresses(&self, user_id: UserId) -> Result<Vec<Address>, BackendError> {
        self.from(ADDRESSES)
            .eq("user_id", user_id)
            .order("created_at", false)
            .fetch()
            .await
    }

    /// Save an address. A new default address clears the previous default.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert is rejected.
    #[instrument(skip(self, address), fields(user_id = %user_id))]
    pub async fn create_address(
        &self,
        user_id: UserId,
        address: &NewAddress,
    ) -> Result<Address, BackendError> {
        if address.is_default {
            self.clear_default_address(user_id).await?;
        }
        self.from(ADDRESSES)
            .insert::<_, Address>(&NewAddressRow { user_id, address })
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound("inserted address".to_string()))
    }

    /// Make one of a user's addresses the default.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if the address does not belong to
    /// the user.
    #[instrument(skip(self))]
    pub async fn set_default_address(
        &self,
        user_id: UserId,
        address_id: AddressId,
    ) -> Result<Address, BackendError> {
        self.clear_default_address(user_id).await?;
        self.from(ADDRESSES)
            .eq("id", address_id)
            .eq("user_id", user_id)
            .update::<_, Address>(&json!({ "is_default": true }))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("address {address_id}")))
    }

    /// Delete one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn delete_address(
        &self,
        user_id: UserId,
        address_id: AddressId,
    ) -> Result<(), BackendError> {
        self.from(ADDRESSES)
            .eq("id", address_id)
            .eq("user_id", user_id)
            .delete()
            .await
    }

    async fn clear_default_address(&self, user_id: UserId) -> Result<(), BackendError> {
        self.from(ADDRESSES)
            .eq("user_id", user_id)
            .eq("is_default", true)
            .update::<_, serde_json::Value>(&json!({ "is_default": false }))
            .await?;
        Ok(())
    }
}
