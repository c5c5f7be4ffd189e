//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use oja_core::account::{Address, NewProfile, ProfileUpdate};
use oja_core::ProfileRole;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::{RequireAuth, set_current_user};
use crate::routes::views::Layout;
use crate::state::AppState;

/// Saved address display data for templates.
#[derive(Debug, Clone)]
pub struct AddressView {
    pub name: String,
    pub lines: String,
    pub phone: String,
    pub is_default: bool,
}

impl From<&Address> for AddressView {
    fn from(address: &Address) -> Self {
        let lines = [
            address.street_address.as_str(),
            address.city.as_str(),
            address.state_province.as_str(),
            address.postal_code.as_str(),
            address.country.as_str(),
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

        Self {
            name: format!("{} {}", address.first_name, address.last_name)
                .trim()
                .to_string(),
            lines,
            phone: address.phone.clone(),
            is_default: address.is_default,
        }
    }
}

/// Account page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountTemplate {
    pub layout: Layout,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub addresses: Vec<AddressView>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
}

impl ProfileForm {
    fn changes(&self) -> ProfileUpdate {
        ProfileUpdate {
            first_name: Some(self.first_name.trim().to_string()),
            last_name: Some(self.last_name.trim().to_string()),
            phone: Some(self.phone.trim().to_string()),
            avatar_url: None,
        }
    }
}

/// Query parameters for error/success display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Display the account page.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    layout: Layout,
    RequireAuth(user): RequireAuth,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    // The session copy of the profile is good enough to render if the
    // address book is unavailable
    let addresses = state
        .backend()
        .as_user(&user.access_token)
        .get_user_addresses(user.id)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load addresses");
            Vec::new()
        });

    AccountTemplate {
        layout,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        phone: user.phone,
        addresses: addresses.iter().map(AddressView::from).collect(),
        error: query.error,
        success: query.success,
    }
}

/// Update the customer's profile.
///
/// Customers created before profiles existed get one on first save.
///
/// # Errors
///
/// Returns an error if the session cannot be updated.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(mut user): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Redirect> {
    if form.first_name.trim().is_empty() || form.last_name.trim().is_empty() {
        return Ok(Redirect::to("/account?error=missing_field"));
    }

    let backend = state.backend().as_user(&user.access_token);
    let saved = match backend.update_profile(user.id, &form.changes()).await {
        Err(e) if e.is_not_found() => {
            backend
                .create_profile(&NewProfile {
                    user_id: user.id,
                    first_name: form.first_name.trim().to_string(),
                    last_name: form.last_name.trim().to_string(),
                    phone: form.phone.trim().to_string(),
                    role: ProfileRole::Customer,
                })
                .await
        }
        other => other,
    };

    match saved {
        Ok(profile) => {
            user.apply_profile(&profile);
            set_current_user(&session, &user).await?;
            Ok(Redirect::to("/account?success=updated"))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to save profile");
            Ok(Redirect::to("/account?error=profile"))
        }
    }
}
