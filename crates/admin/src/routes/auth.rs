//! Authentication route handlers for admin.
//!
//! Admins sign in with the same email and password as any other account.
//! Only accounts whose profile carries the admin role get a session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use oja_backend::AuthSession;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{OptionalAdminAuth, clear_current_admin, set_current_admin};
use crate::models::CurrentAdmin;
use crate::state::AppState;

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
}

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Query parameters for error display.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
}

/// Why a sign-in did not produce an admin session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refusal {
    Credentials,
    Forbidden,
    Session,
}

impl Refusal {
    const fn code(self) -> &'static str {
        match self {
            Self::Credentials => "credentials",
            Self::Forbidden => "forbidden",
            Self::Session => "session",
        }
    }
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login_page).post(login))
        .route("/auth/logout", post(logout))
}

/// Render the login page.
///
/// GET /auth/login
async fn login_page(
    OptionalAdminAuth(admin): OptionalAdminAuth,
    Query(query): Query<LoginQuery>,
) -> Response {
    if admin.is_some() {
        return Redirect::to("/").into_response();
    }
    LoginTemplate { error: query.error }.into_response()
}

/// Check credentials and the admin role, then start a session.
///
/// POST /auth/login
#[instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Redirect {
    match authenticate(&state, &session, &form).await {
        Ok(admin) => {
            set_sentry_user(&admin.id, Some(&admin.email));
            tracing::info!(admin_id = %admin.id, "Admin signed in");
            Redirect::to("/")
        }
        Err(refusal) => Redirect::to(&format!("/auth/login?error={}", refusal.code())),
    }
}

async fn authenticate(
    state: &AppState,
    session: &Session,
    form: &LoginForm,
) -> Result<CurrentAdmin, Refusal> {
    let auth = state
        .auth()
        .sign_in_with_password(form.email.trim(), &form.password)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Admin login failed");
            Refusal::Credentials
        })?;

    let profile = match state.backend().get_profile(auth.user.id).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load admin profile");
            revoke(state, &auth).await;
            return Err(Refusal::Session);
        }
    };

    let Some(admin) = profile
        .as_ref()
        .and_then(|profile| CurrentAdmin::from_profile(&auth, profile))
    else {
        tracing::warn!(user_id = %auth.user.id, "Non-admin account refused");
        revoke(state, &auth).await;
        return Err(Refusal::Forbidden);
    };

    let stored = async {
        session.cycle_id().await?;
        set_current_admin(session, &admin).await
    };
    if let Err(e) = stored.await {
        tracing::error!("Failed to set session: {e}");
        return Err(Refusal::Session);
    }
    Ok(admin)
}

/// Best-effort revocation of a token we are not going to keep.
async fn revoke(state: &AppState, auth: &AuthSession) {
    if let Err(e) = state.auth().sign_out(&auth.access_token).await {
        tracing::debug!(error = %e, "Token revocation failed");
    }
}

/// Logout and clear session.
///
/// POST /auth/logout
#[instrument(skip_all)]
async fn logout(
    State(state): State<AppState>,
    OptionalAdminAuth(admin): OptionalAdminAuth,
    session: Session,
) -> impl IntoResponse {
    if let Some(admin) = admin {
        if let Err(e) = state.auth().sign_out(&admin.access_token).await {
            tracing::debug!(error = %e, "Sign-out call failed");
        }
        tracing::info!(admin_id = %admin.id, "Admin signed out");
    }

    let _ = clear_current_admin(&session).await;
    if let Err(e) = session.flush().await {
        tracing::warn!("Failed to flush session: {e}");
    }
    clear_sentry_user();

    Redirect::to("/auth/login")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_page_shows_refusal_message() {
        let html = LoginTemplate {
            error: Some(Refusal::Forbidden.code().to_string()),
        }
        .render()
        .unwrap();
        assert!(html.contains("This account does not have admin access."));
        assert!(html.contains(r#"action="/auth/login""#));
    }

    #[test]
    fn test_login_page_without_error() {
        let html = LoginTemplate { error: None }.render().unwrap();
        assert!(!html.contains("class=\"alert"));
    }
}
