//! Authentication: login, registration, logout, password reset, and the
//! machinery that keeps the access token fresh.

mod pipeline;
mod refresh;

pub use pipeline::{Attempt, AuthorizedClient};
pub use refresh::CredentialRefresher;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{info, instrument, warn};

use emporium_core::Email;

use crate::api::request_id::new_request_id;
use crate::api::{ApiClient, ApiRequest};
use crate::error::{ApiError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::models::{AuthPayload, Session};
use crate::session::{LoginFlag, SessionStore};

/// Login form input.
#[derive(Debug, Clone)]
pub struct LoginForm {
    /// Username or email address.
    pub username_or_email: String,
    /// Password.
    pub password: SecretString,
}

/// Registration form input.
#[derive(Debug, Clone)]
pub struct RegisterForm {
    /// Display name.
    pub username: String,
    /// Email address, validated before sending.
    pub email: String,
    /// Password.
    pub password: SecretString,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody<'a> {
    username_or_email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

/// Login, registration, logout and password reset.
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
    authorized: AuthorizedClient,
    store: SessionStore,
    login_flag: Arc<dyn LoginFlag>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}

impl AuthService {
    /// Create the service.
    #[must_use]
    pub fn new(
        api: ApiClient,
        authorized: AuthorizedClient,
        store: SessionStore,
        login_flag: Arc<dyn LoginFlag>,
    ) -> Self {
        Self {
            api,
            authorized,
            store,
            login_flag,
        }
    }

    /// Log in and install the session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::ValidationFailed` on bad credentials, or a
    /// transport error.
    #[instrument(skip_all, fields(request_id))]
    pub async fn login(&self, form: &LoginForm) -> Result<Arc<Session>> {
        if form.username_or_email.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "Username or email is required".to_string(),
            ));
        }
        let request = ApiRequest::post("login").json(&LoginBody {
            username_or_email: form.username_or_email.trim(),
            password: form.password.expose_secret(),
        })?;
        let payload: AuthPayload = self
            .api
            .send(&request, None, &new_request_id())
            .await?
            .decode()?;
        Ok(self.establish(payload, "login"))
    }

    /// Create an account and install the session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidEmail` or `ApiError::InvalidInput` before any
    /// network call if the form is invalid, `ApiError::ValidationFailed` if
    /// the server rejects it (e.g. duplicate email).
    #[instrument(skip_all, fields(request_id))]
    pub async fn register(&self, form: &RegisterForm) -> Result<Arc<Session>> {
        let email = Email::parse(&form.email)?;
        let username = form.username.trim();
        if username.is_empty() {
            return Err(ApiError::InvalidInput("Username is required".to_string()));
        }
        if form.password.expose_secret().is_empty() {
            return Err(ApiError::InvalidInput("Password is required".to_string()));
        }

        let request = ApiRequest::post("register").json(&RegisterBody {
            username,
            email: email.as_str(),
            password: form.password.expose_secret(),
        })?;
        let payload: AuthPayload = self
            .api
            .send(&request, None, &new_request_id())
            .await?
            .decode()?;
        Ok(self.establish(payload, "register"))
    }

    /// Log out.
    ///
    /// The local session is always cleared and the login flag always set to
    /// false, whatever the server says. The server outcome is returned for
    /// reporting only.
    ///
    /// # Errors
    ///
    /// Returns the server or transport error of the logout call.
    pub async fn logout(&self) -> Result<Option<String>> {
        let outcome = self.authorized.execute(&ApiRequest::post("logout")).await;

        self.store.clear();
        self.login_flag.set(false);
        clear_sentry_user();
        add_breadcrumb("session", "Logged out", None);

        match outcome {
            Ok(response) => {
                info!("Logged out");
                Ok(response.message)
            }
            Err(e) => {
                warn!(error = %e, "Logout call failed, local session cleared anyway");
                Err(e)
            }
        }
    }

    /// Ask the server to email a password reset link.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidEmail` before any network call, or the
    /// server's rejection.
    #[instrument(skip_all, fields(request_id))]
    pub async fn forgot_password(&self, email: &str) -> Result<Option<String>> {
        let email = Email::parse(email)?;
        let request = ApiRequest::post("password/forgot")
            .json(&serde_json::json!({ "email": email.as_str() }))?;
        let response = self.api.send(&request, None, &new_request_id()).await?;
        Ok(response.message)
    }

    /// Set a new password using the token from the reset link.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidInput` for an empty token or password, or the
    /// server's rejection (e.g. expired token).
    #[instrument(skip_all, fields(request_id))]
    pub async fn reset_password(&self, token: &str, password: &SecretString) -> Result<Option<String>> {
        if token.trim().is_empty() || password.expose_secret().is_empty() {
            return Err(ApiError::InvalidInput(
                "Reset token and password are required".to_string(),
            ));
        }
        let request = ApiRequest::post(format!("password/reset/{}", urlencoding::encode(token.trim())))
            .json(&serde_json::json!({ "password": password.expose_secret() }))?;
        let response = self.api.send(&request, None, &new_request_id()).await?;
        Ok(response.message)
    }

    fn establish(&self, payload: AuthPayload, via: &str) -> Arc<Session> {
        let session = Session::from_payload(payload);
        set_sentry_user(&session.identity.id, Some(session.identity.email.as_str()));
        info!(user_id = %session.identity.id, via, "Session established");

        let session = self.store.replace(session);
        self.login_flag.set(true);
        add_breadcrumb("session", "Session established", Some(&[("via", via)]));
        session
    }
}
