//! Auth API: email/password accounts and sessions.

use chrono::{DateTime, Utc};
use oja_core::UserId;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use crate::{Backend, BackendError};

/// An auth user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    /// Metadata supplied at sign-up (first and last name).
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    /// A string field of the sign-up metadata.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key)?.as_str()
    }
}

/// A signed-in session.
///
/// Tokens are kept as plain strings so the session can be stored in the
/// browser session; `Debug` redacts them.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user.id)
            .finish()
    }
}

impl AuthSession {
    /// Whether the access token expires within `leeway_secs` of `now`.
    #[must_use]
    pub fn expires_soon(&self, now: DateTime<Utc>, leeway_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at - leeway_secs <= now.timestamp())
    }
}

/// Result of signing up.
///
/// When email confirmation is on, sign-up only returns the new user; when
/// it is off the user is signed in straight away.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpOutcome {
    SignedIn(Box<AuthSession>),
    ConfirmationRequired(AuthUser),
}

impl SignUpOutcome {
    #[must_use]
    pub fn user(&self) -> &AuthUser {
        match self {
            Self::SignedIn(session) => &session.user,
            Self::ConfirmationRequired(user) => user,
        }
    }
}

impl Backend {
    /// Map auth API rejections to [`BackendError::Auth`].
    async fn auth_call(&self, request: reqwest::RequestBuilder) -> Result<String, BackendError> {
        match self.send(request).await {
            Ok((_, text)) => Ok(text),
            Err(BackendError::Api { status, body }) if status < 500 => {
                Err(BackendError::Auth(body.describe()))
            }
            Err(e) => Err(e),
        }
    }

    /// Register a new account with sign-up metadata.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Auth`] if the email is taken or the password
    /// is rejected.
    #[instrument(skip(self, password, metadata))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<SignUpOutcome, BackendError> {
        let request = self.request(Method::POST, "auth/v1/signup").json(&json!({
            "email": email,
            "password": password,
            "data": metadata,
        }));
        let text = self.auth_call(request).await?;
        Self::decode(&text)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Auth`] for bad credentials.
    #[instrument(skip(self, password))]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        let request = self
            .request(Method::POST, "auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let text = self.auth_call(request).await?;
        Self::decode(&text)
    }

    /// Exchange a refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Auth`] if the refresh token is no longer
    /// valid.
    #[instrument(skip_all)]
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, BackendError> {
        let request = self
            .request(Method::POST, "auth/v1/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));
        let text = self.auth_call(request).await?;
        Self::decode(&text)
    }

    /// Revoke the session behind `access_token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let request = self
            .request_as(Method::POST, "auth/v1/logout", access_token);
        self.auth_call(request).await?;
        Ok(())
    }

    /// Send a password reset email linking back to `redirect_to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn recover(&self, email: &str, redirect_to: &str) -> Result<(), BackendError> {
        let request = self
            .request(Method::POST, "auth/v1/recover")
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }));
        self.auth_call(request).await?;
        Ok(())
    }

    /// Exchange the token from a password reset email for a session.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Auth`] if the token is invalid or used.
    #[instrument(skip_all)]
    pub async fn verify_recovery(&self, token_hash: &str) -> Result<AuthSession, BackendError> {
        let request = self
            .request(Method::POST, "auth/v1/verify")
            .json(&json!({ "type": "recovery", "token_hash": token_hash }));
        let text = self.auth_call(request).await?;
        Self::decode(&text)
    }

    /// Set a new password for the user owning `access_token`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Auth`] if the password is rejected.
    #[instrument(skip_all)]
    pub async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<AuthUser, BackendError> {
        let request = self
            .request_as(Method::PUT, "auth/v1/user", access_token)
            .json(&json!({ "password": password }));
        let text = self.auth_call(request).await?;
        Self::decode(&text)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const USER: &str = r#"{"id":"1d5f1c0e-2a4b-4c6d-8e9f-0a1b2c3d4e5f","email":"ada@example.com","user_metadata":{"first_name":"Ada"},"created_at":"2025-02-01T10:00:00Z"}"#;

    #[test]
    fn test_sign_up_outcome_variants() {
        let user_only: SignUpOutcome = serde_json::from_str(USER).unwrap();
        assert!(matches!(user_only, SignUpOutcome::ConfirmationRequired(_)));
        assert_eq!(user_only.user().metadata_str("first_name"), Some("Ada"));

        let session = format!(
            r#"{{"access_token":"a","refresh_token":"r","expires_in":3600,"expires_at":1700003600,"user":{USER}}}"#
        );
        let signed_in: SignUpOutcome = serde_json::from_str(&session).unwrap();
        assert!(matches!(signed_in, SignUpOutcome::SignedIn(_)));
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let session: AuthSession = serde_json::from_str(&format!(
            r#"{{"access_token":"secret-access","refresh_token":"secret-refresh","user":{USER}}}"#
        ))
        .unwrap();
        let debug = format!("{session:?}");
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }

    #[test]
    fn test_expires_soon() {
        let session: AuthSession = serde_json::from_str(&format!(
            r#"{{"access_token":"a","refresh_token":"r","expires_at":1700003600,"user":{USER}}}"#
        ))
        .unwrap();
        let early = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let late = Utc.timestamp_opt(1_700_003_570, 0).unwrap();
        assert!(!session.expires_soon(early, 60));
        assert!(session.expires_soon(late, 60));
    }
}
