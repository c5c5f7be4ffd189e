//! Authentication route handlers.
//!
//! Handles login, registration, password reset and logout against the
//! backend's auth API. The customer's tokens are kept in the session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use oja_backend::{AuthSession, SignUpOutcome};
use oja_core::account::NewProfile;
use oja_core::{Email, ProfileRole};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use crate::filters;
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::routes::views::Layout;
use crate::state::AppState;

/// Shortest password accepted at sign-up and reset.
const MIN_PASSWORD_LEN: usize = 8;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// Reset password form data.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub token_hash: String,
    pub password: String,
    pub password_confirm: String,
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for error/success display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
    pub next: Option<String>,
}

/// Query parameters on the reset link from the recovery email.
#[derive(Debug, Deserialize)]
pub struct ResetQuery {
    pub token_hash: Option<String>,
    pub error: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub error: Option<String>,
    pub success: Option<String>,
    pub next: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub layout: Layout,
    pub error: Option<String>,
}

/// Registration success page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register_success.html")]
pub struct RegisterSuccessTemplate {
    pub layout: Layout,
    pub email: String,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub layout: Layout,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Reset password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub layout: Layout,
    pub error: Option<String>,
    pub token_hash: String,
}

// =============================================================================
// Helpers
// =============================================================================

/// Where to go after login. Only same-site paths are followed.
#[must_use]
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/account",
    }
}

fn password_problem(password: &str, confirm: &str) -> Option<&'static str> {
    if password != confirm {
        Some("password_mismatch")
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        Some("password_too_short")
    } else {
        None
    }
}

/// Store a fresh auth session as the current user.
///
/// The session id is rotated so a pre-login id cannot be reused.
async fn sign_in(
    state: &AppState,
    session: &Session,
    auth: &AuthSession,
) -> Result<CurrentUser, tower_sessions::session::Error> {
    let profile = state
        .backend()
        .as_user(&auth.access_token)
        .get_profile(auth.user.id)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load profile at sign-in");
            None
        });

    let user = CurrentUser::new(auth, profile.as_ref());
    session.cycle_id().await?;
    set_current_user(session, &user).await?;
    Ok(user)
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(layout: Layout, Query(query): Query<MessageQuery>) -> impl IntoResponse {
    LoginTemplate {
        layout,
        error: query.error,
        success: query.success,
        next: safe_next(query.next.as_deref()).to_string(),
    }
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_next(form.next.as_deref()).to_string();
    let retry = |code: &str| {
        Redirect::to(&format!(
            "/login?error={code}&next={}",
            urlencoding::encode(&next)
        ))
        .into_response()
    };

    let auth = match state
        .backend()
        .sign_in_with_password(form.email.trim(), &form.password)
        .await
    {
        Ok(auth) => auth,
        Err(e) => {
            tracing::warn!(error = %e, "Login failed");
            return retry("credentials");
        }
    };

    match sign_in(&state, &session, &auth).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "Customer signed in");
            Redirect::to(&next).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to set session: {e}");
            retry("session")
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(
    layout: Layout,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    RegisterTemplate {
        layout,
        error: query.error,
    }
}

/// Handle registration form submission.
///
/// Creates the auth user and its customer profile. If the backend signs the
/// user in straight away they land on their account; otherwise they are
/// asked to confirm their email first.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    layout: Layout,
    Form(form): Form<RegisterForm>,
) -> Response {
    if let Some(code) = password_problem(&form.password, &form.password_confirm) {
        return Redirect::to(&format!("/register?error={code}")).into_response();
    }
    if form.first_name.trim().is_empty() || form.last_name.trim().is_empty() {
        return Redirect::to("/register?error=missing_field").into_response();
    }
    let Ok(email) = Email::parse(&form.email) else {
        return Redirect::to("/register?error=invalid_email").into_response();
    };

    let metadata = json!({
        "first_name": form.first_name.trim(),
        "last_name": form.last_name.trim(),
    });
    let outcome = match state
        .backend()
        .sign_up(email.as_str(), &form.password, metadata)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(error = %e, "Registration failed");
            let code = if e.to_string().contains("already") {
                "email_taken"
            } else {
                "failed"
            };
            return Redirect::to(&format!("/register?error={code}")).into_response();
        }
    };

    let profile = NewProfile {
        user_id: outcome.user().id,
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        phone: form.phone.trim().to_string(),
        role: ProfileRole::Customer,
    };
    let backend = match &outcome {
        SignUpOutcome::SignedIn(auth) => state.backend().as_user(&auth.access_token),
        SignUpOutcome::ConfirmationRequired(_) => state.backend().clone(),
    };
    if let Err(e) = backend.create_profile(&profile).await {
        // The account is usable without a profile; it is created on first edit
        tracing::warn!(user_id = %profile.user_id, error = %e, "Failed to create profile");
    }

    match outcome {
        SignUpOutcome::SignedIn(auth) => match sign_in(&state, &session, &auth).await {
            Ok(_) => Redirect::to("/account").into_response(),
            Err(e) => {
                tracing::error!("Failed to set session after registration: {e}");
                Redirect::to("/login?error=session").into_response()
            }
        },
        SignUpOutcome::ConfirmationRequired(_) => RegisterSuccessTemplate {
            layout,
            email: email.into_inner(),
        }
        .into_response(),
    }
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// Display the forgot password page.
pub async fn forgot_password_page(
    layout: Layout,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    ForgotPasswordTemplate {
        layout,
        error: query.error,
        success: query.success,
    }
}

/// Send a password reset email.
///
/// The answer is the same whether or not the email has an account.
#[instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Form(form): Form<ForgotPasswordForm>,
) -> Redirect {
    let Ok(email) = Email::parse(&form.email) else {
        return Redirect::to("/forgot-password?error=invalid_email");
    };

    let redirect_to = state.config().url_for("/reset-password");
    if let Err(e) = state.backend().recover(email.as_str(), &redirect_to).await {
        tracing::warn!(error = %e, "Password recovery request failed");
    }

    Redirect::to("/forgot-password?success=sent")
}

/// Display the reset password page from the recovery email link.
pub async fn reset_password_page(layout: Layout, Query(query): Query<ResetQuery>) -> Response {
    match query.token_hash.filter(|t| !t.is_empty()) {
        Some(token_hash) => ResetPasswordTemplate {
            layout,
            error: query.error,
            token_hash,
        }
        .into_response(),
        None => Redirect::to("/forgot-password?error=invalid_link").into_response(),
    }
}

/// Set a new password using the recovery token.
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Form(form): Form<ResetPasswordForm>,
) -> Redirect {
    let retry = |code: &str| {
        Redirect::to(&format!(
            "/reset-password?token_hash={}&error={code}",
            urlencoding::encode(&form.token_hash)
        ))
    };

    if let Some(code) = password_problem(&form.password, &form.password_confirm) {
        return retry(code);
    }

    let auth = match state.backend().verify_recovery(&form.token_hash).await {
        Ok(auth) => auth,
        Err(e) => {
            tracing::warn!(error = %e, "Recovery token rejected");
            return Redirect::to("/forgot-password?error=invalid_link");
        }
    };

    match state
        .backend()
        .update_password(&auth.access_token, &form.password)
        .await
    {
        Ok(_) => Redirect::to("/login?success=password_reset"),
        Err(e) => {
            tracing::warn!(error = %e, "Password update failed");
            retry("failed")
        }
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Sign out and drop the session.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, session: Session) -> Redirect {
    if let Ok(Some(user)) = session
        .get::<CurrentUser>(crate::models::session_keys::CURRENT_USER)
        .await
        && let Err(e) = state.backend().sign_out(&user.access_token).await
    {
        tracing::info!(error = %e, "Backend sign-out failed");
    }

    if let Err(e) = clear_current_user(&session).await {
        tracing::error!("Failed to clear session: {e}");
    }
    if let Err(e) = session.flush().await {
        tracing::error!("Failed to flush session: {e}");
    }

    Redirect::to("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_allows_local_paths() {
        assert_eq!(safe_next(Some("/orders")), "/orders");
        assert_eq!(safe_next(Some("/account?tab=1")), "/account?tab=1");
    }

    #[test]
    fn test_safe_next_rejects_offsite_targets() {
        assert_eq!(safe_next(Some("//evil.example")), "/account");
        assert_eq!(safe_next(Some("https://evil.example")), "/account");
        assert_eq!(safe_next(Some("/\\evil.example")), "/account");
        assert_eq!(safe_next(None), "/account");
    }

    #[test]
    fn test_password_problem() {
        assert_eq!(password_problem("secret123", "secret124"), Some("password_mismatch"));
        assert_eq!(password_problem("short", "short"), Some("password_too_short"));
        assert_eq!(password_problem("long enough", "long enough"), None);
    }
}
