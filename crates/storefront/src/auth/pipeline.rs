//! Authenticated Request Pipeline.
//!
//! Wraps every call to a protected endpoint:
//!
//! 1. Read the access token from the Session Store at send time
//! 2. Send; on the expired status, refresh (single-flight) and resend once
//!    with the refreshed token, dropping any caller-supplied `Authorization`
//! 3. A second expiry ends the session and surfaces as `Unauthenticated`
//!
//! The retry budget lives in a per-call [`Attempt`] counter, never on the
//! shared request value, so concurrent calls cannot affect each other.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::api::request_id::new_request_id;
use crate::api::{ApiClient, ApiRequest, ApiResponse};
use crate::error::{ApiError, Result, add_breadcrumb, clear_sentry_user};
use crate::session::{LoginFlag, SessionStore};

use super::refresh::CredentialRefresher;

/// Which send of a logical request this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attempt(u8);

impl Attempt {
    /// The original send.
    pub const FIRST: Self = Self(0);
    /// Transparent refresh-and-retry cycles allowed per request.
    pub const MAX_RETRIES: u8 = 1;

    /// Whether another refresh-and-retry is allowed.
    #[must_use]
    pub const fn can_retry(self) -> bool {
        self.0 < Self::MAX_RETRIES
    }

    /// The next attempt.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// 1-based attempt number, for logs.
    #[must_use]
    pub const fn number(self) -> u8 {
        self.0 + 1
    }
}

/// Client for protected endpoints.
#[derive(Clone)]
pub struct AuthorizedClient {
    api: ApiClient,
    store: SessionStore,
    refresher: CredentialRefresher,
    login_flag: Arc<dyn LoginFlag>,
}

impl std::fmt::Debug for AuthorizedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedClient")
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

impl AuthorizedClient {
    /// Create a pipeline over `api` using `store` for credentials.
    #[must_use]
    pub fn new(
        api: ApiClient,
        store: SessionStore,
        refresher: CredentialRefresher,
        login_flag: Arc<dyn LoginFlag>,
    ) -> Self {
        Self {
            api,
            store,
            refresher,
            login_flag,
        }
    }

    /// Send `request` with at most one transparent refresh-and-retry.
    ///
    /// Requests sent while logged out carry no `Authorization` header.
    ///
    /// # Errors
    ///
    /// - The refresh error if the token expired and refresh failed.
    /// - `ApiError::Unauthenticated` if the retry also got the expired status;
    ///   the session is ended first.
    /// - Otherwise the classified error of the last attempt.
    #[instrument(
        skip_all,
        fields(method = %request.method(), path = %request.path(), request_id)
    )]
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let request_id = new_request_id();
        let mut attempt = Attempt::FIRST;
        let mut retry: Option<ApiRequest> = None;

        loop {
            let current = retry.as_ref().unwrap_or(request);
            let (token, epoch) = self.store.credential();
            debug!(attempt = attempt.number(), authenticated = token.is_some(), "Sending");

            let outcome = self.api.send(current, token.as_ref(), &request_id).await;
            match outcome {
                Err(ApiError::AuthExpired) if attempt.can_retry() => {
                    attempt = attempt.next();
                    debug!("Access token expired, refreshing");
                    self.refresher.refresh_after(epoch).await?;
                    // A caller-supplied Authorization is what just expired.
                    if request.has_authorization() {
                        retry = Some(request.clone().without_authorization());
                    }
                }
                Err(ApiError::AuthExpired) => {
                    self.force_logout();
                    return Err(ApiError::Unauthenticated);
                }
                other => return other,
            }
        }
    }

    /// Decode the `data` of a successful [`Self::execute`].
    ///
    /// # Errors
    ///
    /// As [`Self::execute`], plus `ApiError::Decode`.
    pub async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T> {
        self.execute(request).await?.decode()
    }

    /// The Session Store this pipeline reads.
    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    fn force_logout(&self) {
        warn!("Access token rejected after refresh, forcing logout");
        self.store.clear();
        self.login_flag.set(false);
        clear_sentry_user();
        add_breadcrumb("session", "Forced logout", Some(&[("reason", "expired_after_refresh")]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_budget_is_one_retry() {
        let first = Attempt::FIRST;
        assert!(first.can_retry());
        assert_eq!(first.number(), 1);
        let second = first.next();
        assert!(!second.can_retry());
        assert_eq!(second.number(), 2);
    }
}
