//! Session Store, Persistent Login Flag and the durable cookie jar.
//!
//! The store holds the in-memory session for the lifetime of the process. It
//! is either `Absent` or fully populated; every mutation is a pure transform
//! of the previous value applied through the closed operation set below, and
//! mutations on an absent session are no-ops.
//!
//! Views subscribe through a `tokio::sync::watch` channel and always see a
//! whole [`SessionState`].

mod cookie_jar;
mod login_flag;

pub use cookie_jar::{COOKIE_JAR_FILE, CookieJar};
pub use login_flag::{FileLoginFlag, LoginFlag, MemoryLoginFlag};

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use emporium_core::{CartEntryId, ProductId};

use crate::models::{AccessToken, CartEntry, Identity, Session, ShippingAddress};

/// Storage key of the persistent login flag.
pub const LOGIN_FLAG_KEY: &str = "isLoggedIn";

/// Snapshot of the store as seen by subscribers.
///
/// `credential_epoch` increases every time the access token is replaced or
/// the session is cleared. The request pipeline uses it to tell whether a
/// concurrent refresh already rotated the token it was sent with.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    session: Option<Arc<Session>>,
    credential_epoch: u64,
}

impl SessionState {
    /// The session, if logged in.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_deref()
    }

    /// Whether a session is present.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Current credential epoch.
    #[must_use]
    pub const fn credential_epoch(&self) -> u64 {
        self.credential_epoch
    }
}

/// Owned, injectable holder of the current session.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.tx.borrow();
        f.debug_struct("SessionStore")
            .field("authenticated", &state.is_authenticated())
            .field("credential_epoch", &state.credential_epoch)
            .finish()
    }
}

impl SessionStore {
    /// Create an empty (logged out) store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(SessionState::default())),
        }
    }

    /// The current session, or `None` when absent.
    #[must_use]
    pub fn get(&self) -> Option<Arc<Session>> {
        self.tx.borrow().session.clone()
    }

    /// The full current state, including the credential epoch.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// The access token and the epoch it belongs to, read together.
    #[must_use]
    pub fn credential(&self) -> (Option<AccessToken>, u64) {
        let state = self.tx.borrow();
        (
            state.session.as_ref().map(|s| s.access_token().clone()),
            state.credential_epoch,
        )
    }

    /// Install a whole new session (login, register, refresh).
    pub fn replace(&self, session: Session) -> Arc<Session> {
        debug!(user_id = %session.identity.id, "session replaced");
        let session = Arc::new(session);
        self.tx.send_modify(|state| {
            state.session = Some(Arc::clone(&session));
            state.credential_epoch += 1;
        });
        session
    }

    /// Install `session` only if no login, refresh or logout happened since
    /// `epoch` was read.
    ///
    /// Returns `None` and leaves the store alone when the epoch moved on.
    pub fn replace_if_current(&self, session: Session, epoch: u64) -> Option<Arc<Session>> {
        let session = Arc::new(session);
        let installed = self.tx.send_if_modified(|state| {
            if state.credential_epoch != epoch {
                return false;
            }
            state.session = Some(Arc::clone(&session));
            state.credential_epoch += 1;
            true
        });
        if installed {
            debug!(user_id = %session.identity.id, "session replaced");
            Some(session)
        } else {
            debug!(epoch, "stale session discarded");
            None
        }
    }

    /// Drop the session (logout, failed refresh).
    ///
    /// Always bumps the epoch, so a refresh that started before this call
    /// cannot reinstate the session.
    pub fn clear(&self) {
        let cleared = self.tx.send_if_modified(|state| {
            state.credential_epoch += 1;
            state.session.take().is_some()
        });
        if cleared {
            debug!("session cleared");
        }
    }

    /// Drop the session only if the epoch is still `epoch`.
    pub fn clear_if_current(&self, epoch: u64) -> bool {
        let mut matched = false;
        let cleared = self.tx.send_if_modified(|state| {
            if state.credential_epoch != epoch {
                return false;
            }
            matched = true;
            state.credential_epoch += 1;
            state.session.take().is_some()
        });
        if cleared {
            debug!("session cleared");
        }
        matched
    }

    /// Replace the wishlist with the server's list.
    pub fn set_wishlist_ids(&self, ids: impl IntoIterator<Item = ProductId>) {
        let ids = ids.into_iter().collect();
        self.update("set_wishlist_ids", |session| session.wishlist_ids = ids);
    }

    /// Add one product to the wishlist.
    pub fn add_wishlist_id(&self, id: ProductId) {
        self.update("add_wishlist_id", |session| {
            session.wishlist_ids.insert(id);
        });
    }

    /// Remove one product from the wishlist.
    pub fn remove_wishlist_id(&self, id: &ProductId) {
        self.update("remove_wishlist_id", |session| {
            session.wishlist_ids.remove(id);
        });
    }

    /// Replace the cart with the server's lines.
    pub fn set_cart(&self, cart: Vec<CartEntry>) {
        self.update("set_cart", |session| session.cart = cart);
    }

    /// Remove a cart line by its entry ID.
    pub fn remove_cart_item(&self, id: &CartEntryId) {
        self.update("remove_cart_item", |session| {
            session.cart.retain(|entry| &entry.id != id);
        });
    }

    /// Replace the address book with the server's list.
    pub fn set_shipping_addresses(&self, addresses: Vec<ShippingAddress>) {
        self.update("set_shipping_addresses", |session| {
            session.shipping_addresses = addresses;
        });
    }

    /// Replace the identity after a profile update. The user ID never changes.
    pub fn update_identity(&self, identity: Identity) {
        self.update("update_identity", |session| {
            if session.identity.id == identity.id {
                session.identity = identity;
            }
        });
    }

    /// Set the avatar URL after a picture upload.
    pub fn set_avatar(&self, avatar: Option<String>) {
        self.update("set_avatar", |session| session.identity.avatar = avatar);
    }

    fn update(&self, op: &'static str, apply: impl FnOnce(&mut Session)) {
        let applied = self.tx.send_if_modified(|state| {
            let Some(current) = state.session.as_ref() else {
                return false;
            };
            let mut next = Session::clone(current);
            apply(&mut next);
            state.session = Some(Arc::new(next));
            true
        });
        if applied {
            debug!(op, "session updated");
        } else {
            debug!(op, "ignored update on absent session");
        }
    }
}
