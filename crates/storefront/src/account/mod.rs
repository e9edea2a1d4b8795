//! Account operations: cart, wishlist, addresses, profile, reviews and
//! checkout.
//!
//! Every call goes through the [`AuthorizedClient`], and every response that
//! carries an authoritative user fragment is written back through the
//! Session Store's operation set.

mod addresses;
mod cart;
mod checkout;
mod profile;
mod reviews;
mod wishlist;

pub use addresses::AddressInput;
pub use cart::CartView;
pub use profile::{AvatarUpload, ProfileUpdate};
pub use reviews::ReviewInput;

use std::sync::Arc;

use crate::auth::AuthorizedClient;
use crate::catalog::CatalogClient;
use crate::error::{ApiError, Result};
use crate::models::Session;
use crate::session::SessionStore;

/// Client for the logged-in user's account.
#[derive(Debug, Clone)]
pub struct AccountClient {
    authorized: AuthorizedClient,
    store: SessionStore,
    catalog: CatalogClient,
}

impl AccountClient {
    /// Create the client.
    #[must_use]
    pub const fn new(authorized: AuthorizedClient, store: SessionStore, catalog: CatalogClient) -> Self {
        Self {
            authorized,
            store,
            catalog,
        }
    }

    /// The current session, or `Unauthenticated`.
    fn session(&self) -> Result<Arc<Session>> {
        self.store.get().ok_or(ApiError::Unauthenticated)
    }
}

/// Reject blank required text fields.
fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}

/// Reject values that are not all ASCII digits.
fn require_digits(field: &str, value: &str) -> Result<()> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::InvalidInput(format!("{field} must be a number")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_validation() {
        assert!(require_text("Name", "  ").is_err());
        assert!(require_text("Name", "Asha").is_ok());
        assert!(require_digits("Phone", "98765 43210").is_err());
        assert!(require_digits("Phone", "abc").is_err());
        assert!(require_digits("Pincode", " 560001 ").is_ok());
    }
}
