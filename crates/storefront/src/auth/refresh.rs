//! Credential Refresh.
//!
//! Exchanges the durable refresh cookie (held by the HTTP client's cookie
//! jar, never read here) for a new access token and user snapshot.
//!
//! Refreshes are single-flight: one async mutex serializes them, and a
//! caller that passes the credential epoch it observed can skip the network
//! call when another task already rotated the token.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::api::request_id::new_request_id;
use crate::api::{ApiClient, ApiRequest};
use crate::error::{ApiError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::models::{AccessToken, AuthPayload, Session};
use crate::session::{LoginFlag, SessionStore};

/// Path of the refresh endpoint.
const REFRESH_PATH: &str = "refresh";

/// Obtains fresh access tokens and keeps the Session Store in sync.
#[derive(Clone)]
pub struct CredentialRefresher {
    inner: Arc<RefresherInner>,
}

struct RefresherInner {
    api: ApiClient,
    store: SessionStore,
    login_flag: Arc<dyn LoginFlag>,
    in_flight: Mutex<()>,
}

impl std::fmt::Debug for CredentialRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRefresher").finish_non_exhaustive()
    }
}

impl CredentialRefresher {
    /// Create a refresher writing to `store` and `login_flag`.
    #[must_use]
    pub fn new(api: ApiClient, store: SessionStore, login_flag: Arc<dyn LoginFlag>) -> Self {
        Self {
            inner: Arc::new(RefresherInner {
                api,
                store,
                login_flag,
                in_flight: Mutex::new(()),
            }),
        }
    }

    /// Refresh unconditionally.
    ///
    /// On success the store holds a new session and the new token is returned.
    ///
    /// # Errors
    ///
    /// - `ApiError::Unauthenticated` if the server rejected the durable
    ///   credential; the store is cleared and the login flag set to false.
    /// - Any other error (network, 5xx, malformed body) leaves the store
    ///   untouched and is returned as-is.
    pub async fn refresh(&self) -> Result<AccessToken> {
        let _guard = self.inner.in_flight.lock().await;
        self.refresh_locked().await
    }

    /// Refresh unless the credential already changed since `seen_epoch`.
    ///
    /// Used by the request pipeline: when several requests fail with an
    /// expired token at once, the first one refreshes and the rest reuse
    /// the result.
    ///
    /// # Errors
    ///
    /// Same as [`Self::refresh`]. Also `ApiError::Unauthenticated` if the
    /// session was cleared while waiting.
    pub async fn refresh_after(&self, seen_epoch: u64) -> Result<AccessToken> {
        let _guard = self.inner.in_flight.lock().await;

        let (token, epoch) = self.inner.store.credential();
        if epoch != seen_epoch {
            return token.map_or_else(
                || {
                    info!("Session ended while waiting for refresh");
                    Err(ApiError::Unauthenticated)
                },
                |token| {
                    info!("Reusing credential from concurrent refresh");
                    Ok(token)
                },
            );
        }

        self.refresh_locked().await
    }

    #[instrument(skip(self), fields(request_id))]
    async fn refresh_locked(&self) -> Result<AccessToken> {
        let request_id = new_request_id();
        let request = ApiRequest::get(REFRESH_PATH);
        let (_, started_at) = self.inner.store.credential();

        let result = match self.inner.api.send(&request, None, &request_id).await {
            Ok(response) => response.decode::<AuthPayload>(),
            Err(e) => Err(e),
        };

        match result {
            Ok(payload) => {
                let session = Session::from_payload(payload);
                let token = session.access_token().clone();
                let user_id = session.identity.id.clone();
                let email = session.identity.email.clone();
                if self.inner.store.replace_if_current(session, started_at).is_none() {
                    return self.superseded();
                }
                set_sentry_user(&user_id, Some(email.as_str()));
                info!(user_id = %user_id, "Access token refreshed");
                add_breadcrumb("session", "Access token refreshed", None);
                Ok(token)
            }
            Err(ApiError::Unauthenticated | ApiError::AuthExpired) => {
                if !self.inner.store.clear_if_current(started_at) {
                    return self.superseded();
                }
                warn!("Refresh rejected, ending session");
                self.inner.login_flag.set(false);
                clear_sentry_user();
                add_breadcrumb("session", "Refresh rejected", None);
                Err(ApiError::Unauthenticated)
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed, session left unchanged");
                Err(e)
            }
        }
    }

    /// A login, logout or other refresh changed the session while this
    /// refresh was on the wire. Its result is dropped in favor of the store.
    fn superseded(&self) -> Result<AccessToken> {
        let (token, _) = self.inner.store.credential();
        token.map_or_else(
            || {
                info!("Session ended during refresh, result discarded");
                Err(ApiError::Unauthenticated)
            },
            |token| {
                info!("Session changed during refresh, using current credential");
                Ok(token)
            },
        )
    }
}
