//! Contact form route handlers.
//!
//! Messages are stored in the backend for the support team to pick up.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use oja_core::records::{ContactMessageError, NewContactMessage};
use serde::Deserialize;
use tracing::instrument;

use crate::filters;
use crate::routes::views::Layout;
use crate::state::AppState;

/// Contact form data.
#[derive(Debug, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: String,
    pub message: String,
}

/// Query parameters for error/success display.
#[derive(Debug, Deserialize)]
pub struct ContactQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Contact page template.
#[derive(Template, WebTemplate)]
#[template(path = "contact.html")]
pub struct ContactTemplate {
    pub layout: Layout,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Display the contact page.
pub async fn show(layout: Layout, Query(query): Query<ContactQuery>) -> impl IntoResponse {
    ContactTemplate {
        layout,
        error: query.error,
        success: query.success,
    }
}

/// Submit a contact message.
#[instrument(skip_all, fields(subject = %form.subject))]
pub async fn submit(State(state): State<AppState>, Form(form): Form<ContactForm>) -> Redirect {
    let message = match NewContactMessage::new(&form.name, &form.email, &form.subject, &form.message)
    {
        Ok(message) => message,
        Err(ContactMessageError::MissingField(_)) => {
            return Redirect::to("/contact?error=missing_field");
        }
        Err(ContactMessageError::InvalidEmail(_)) => {
            return Redirect::to("/contact?error=invalid_email");
        }
    };

    match state.backend().create_contact_message(&message).await {
        Ok(saved) => {
            tracing::info!(message_id = %saved.id, "Contact message received");
            Redirect::to("/contact?success=contact")
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to store contact message");
            Redirect::to("/contact?error=contact")
        }
    }
}
