//! Session Bootstrap.
//!
//! Runs once at start-up and decides whether to restore a session:
//!
//! ```text
//! Idle ──(flag false, or store already has a credential)──────────► Done
//! Idle ──► Restoring ──(refresh succeeds or fails)────────────────► Done
//! ```
//!
//! Callers show a loading indicator only while the phase is `Restoring`.
//! A failed restore is not an error: the user is simply logged out.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, instrument};

use crate::auth::CredentialRefresher;
use crate::error::ApiError;
use crate::session::{LoginFlag, SessionStore};

/// Bootstrap state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    /// Not started.
    Idle,
    /// Refresh in flight; rendering is suspended.
    Restoring,
    /// Finished, whatever the outcome.
    Done,
}

/// How bootstrap ended.
#[derive(Debug, Clone)]
pub enum BootstrapOutcome {
    /// The login flag was false; no network call was made.
    NoPriorSession,
    /// The store already held a credential; no network call was made.
    AlreadyAuthenticated,
    /// A session was restored from the durable credential.
    Restored,
    /// Restoration failed; the user is treated as logged out.
    NotRestored(ApiError),
    /// Bootstrap had already run.
    AlreadyRan,
}

/// Runs the start-up session restore.
#[derive(Debug, Clone)]
pub struct SessionBootstrap {
    store: SessionStore,
    login_flag: Arc<dyn LoginFlag>,
    refresher: CredentialRefresher,
    phase: Arc<watch::Sender<BootstrapPhase>>,
}

impl SessionBootstrap {
    /// Create a bootstrap in the `Idle` phase.
    #[must_use]
    pub fn new(
        store: SessionStore,
        login_flag: Arc<dyn LoginFlag>,
        refresher: CredentialRefresher,
    ) -> Self {
        Self {
            store,
            login_flag,
            refresher,
            phase: Arc::new(watch::Sender::new(BootstrapPhase::Idle)),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> BootstrapPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions, e.g. to drive a loading indicator.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BootstrapPhase> {
        self.phase.subscribe()
    }

    /// Run the bootstrap. Only the first call does anything.
    #[instrument(skip(self))]
    pub async fn run(&self) -> BootstrapOutcome {
        let started = self.phase.send_if_modified(|phase| {
            if *phase != BootstrapPhase::Idle {
                return false;
            }
            *phase = if self.login_flag.get() && self.store.get().is_none() {
                BootstrapPhase::Restoring
            } else {
                BootstrapPhase::Done
            };
            true
        });

        if !started {
            return BootstrapOutcome::AlreadyRan;
        }

        if self.phase() == BootstrapPhase::Done {
            return if self.store.get().is_some() {
                info!("Session already present, skipping restore");
                BootstrapOutcome::AlreadyAuthenticated
            } else {
                info!("No prior session, skipping restore");
                BootstrapOutcome::NoPriorSession
            };
        }

        info!("Restoring session");
        let outcome = match self.refresher.refresh().await {
            Ok(_) => {
                info!("Session restored");
                BootstrapOutcome::Restored
            }
            Err(e) => {
                info!(error = %e, "Session not restored");
                BootstrapOutcome::NotRestored(e)
            }
        };
        self.phase.send_replace(BootstrapPhase::Done);
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::session::CookieJar;
    use url::Url;

    use super::*;
    use crate::api::ApiClient;
    use crate::config::StorefrontConfig;
    use crate::models::session::tests::sample_session;
    use crate::session::MemoryLoginFlag;

    // Port 9 (discard) is never served; any network call would fail the test.
    fn bootstrap(flag: bool, store: &SessionStore) -> SessionBootstrap {
        let config = StorefrontConfig::new(Url::parse("http://127.0.0.1:9/api").unwrap());
        let api = ApiClient::new(&config, Arc::new(CookieJar::in_memory())).unwrap();
        let login_flag: Arc<dyn LoginFlag> = Arc::new(MemoryLoginFlag::new(flag));
        let refresher = CredentialRefresher::new(api, store.clone(), Arc::clone(&login_flag));
        SessionBootstrap::new(store.clone(), login_flag, refresher)
    }

    #[tokio::test]
    async fn test_no_prior_session_goes_straight_to_done() {
        let store = SessionStore::new();
        let bootstrap = bootstrap(false, &store);
        let mut phases = bootstrap.subscribe();
        assert_eq!(bootstrap.phase(), BootstrapPhase::Idle);

        assert!(matches!(bootstrap.run().await, BootstrapOutcome::NoPriorSession));
        assert_eq!(bootstrap.phase(), BootstrapPhase::Done);
        assert_eq!(*phases.borrow_and_update(), BootstrapPhase::Done);
        assert!(store.get().is_none());
    }

    #[tokio::test]
    async fn test_existing_credential_skips_restore() {
        let store = SessionStore::new();
        store.replace(sample_session());
        let bootstrap = bootstrap(true, &store);
        assert!(matches!(
            bootstrap.run().await,
            BootstrapOutcome::AlreadyAuthenticated
        ));
        assert_eq!(bootstrap.phase(), BootstrapPhase::Done);
    }

    #[tokio::test]
    async fn test_runs_once() {
        let store = SessionStore::new();
        let bootstrap = bootstrap(false, &store);
        bootstrap.run().await;
        assert!(matches!(bootstrap.run().await, BootstrapOutcome::AlreadyRan));
    }
}
