//! Session-related types.
//!
//! A [`Session`] is the in-memory picture of who is logged in and what they
//! currently have. It is only ever built whole, from a user snapshot plus an
//! access token, so dependent code never sees a half-populated session.

use std::collections::BTreeSet;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use emporium_core::{AddressId, AddressType, CartEntryId, Email, Gender, ProductId, Quantity, UserId};

use super::{lenient_parse, required_string_or_number, string_or_number};

/// Short-lived bearer token authorizing API calls.
///
/// The client cannot inspect its expiry; it only learns the token is stale
/// when the API rejects it.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    /// Wrap a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// The `Authorization` header value for this token.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0.expose_secret())
    }

    /// The raw token. Avoid logging this.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Server-sourced identity of the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User's document ID.
    pub id: UserId,
    /// Display name.
    pub username: String,
    /// Avatar image URL.
    pub avatar: Option<String>,
    /// Email address.
    pub email: Email,
    /// Phone number.
    pub phone: Option<String>,
    /// Gender.
    pub gender: Option<Gender>,
}

/// One line of the session cart: which product and how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    /// Cart entry document ID.
    #[serde(rename = "_id")]
    pub id: CartEntryId,
    /// Product in this line.
    #[serde(rename = "productId")]
    pub product_id: ProductId,
    /// Units of the product, always 1..=6.
    pub quantity: Quantity,
}

/// A persisted shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    /// Generated address ID.
    #[serde(rename = "_id")]
    pub id: AddressId,
    /// Recipient name.
    pub name: String,
    /// Contact phone.
    #[serde(deserialize_with = "required_string_or_number")]
    pub phone: String,
    /// Postal code.
    #[serde(deserialize_with = "required_string_or_number")]
    pub pincode: String,
    /// Locality or neighbourhood.
    pub locality: String,
    /// Street address.
    pub address: String,
    /// City.
    pub city: String,
    /// State.
    pub state: String,
    /// Home or work.
    #[serde(default)]
    pub address_type: AddressType,
    /// Alternate contact phone.
    #[serde(default, deserialize_with = "string_or_number")]
    pub alternate_phone: Option<String>,
}

/// The user document returned by login, register and refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    /// User's document ID.
    #[serde(alias = "_id")]
    pub id: UserId,
    /// Display name.
    pub username: String,
    /// Avatar image URL.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Email address.
    pub email: Email,
    /// Phone number.
    #[serde(default, deserialize_with = "string_or_number")]
    pub phone: Option<String>,
    /// Gender.
    #[serde(default, deserialize_with = "lenient_parse")]
    pub gender: Option<Gender>,
    /// Wishlisted product IDs.
    #[serde(default)]
    pub wishlist_ids: Vec<ProductId>,
    /// Cart lines.
    #[serde(default)]
    pub cart: Vec<CartEntry>,
    /// Saved shipping addresses.
    #[serde(default)]
    pub shipping_addresses: Vec<ShippingAddress>,
}

/// `data` payload of login, register and refresh responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    /// The user document.
    pub user: UserSnapshot,
    /// A fresh access token.
    pub access_token: String,
}

/// Authenticated session state.
#[derive(Debug, Clone)]
pub struct Session {
    /// Who is logged in.
    pub identity: Identity,
    access_token: AccessToken,
    /// Wishlisted product IDs (order irrelevant).
    pub wishlist_ids: BTreeSet<ProductId>,
    /// Cart lines in server order.
    pub cart: Vec<CartEntry>,
    /// Saved shipping addresses in server order.
    pub shipping_addresses: Vec<ShippingAddress>,
}

impl Session {
    /// Build a session from a user snapshot and the token that came with it.
    #[must_use]
    pub fn from_snapshot(user: UserSnapshot, access_token: AccessToken) -> Self {
        Self {
            identity: Identity {
                id: user.id,
                username: user.username,
                avatar: user.avatar,
                email: user.email,
                phone: user.phone,
                gender: user.gender,
            },
            access_token,
            wishlist_ids: user.wishlist_ids.into_iter().collect(),
            cart: user.cart,
            shipping_addresses: user.shipping_addresses,
        }
    }

    /// Build a session from an auth response payload.
    #[must_use]
    pub fn from_payload(payload: AuthPayload) -> Self {
        Self::from_snapshot(payload.user, AccessToken::new(payload.access_token))
    }

    /// The current access token.
    #[must_use]
    pub const fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    /// Whether `product` is on the wishlist.
    #[must_use]
    pub fn in_wishlist(&self, product: &ProductId) -> bool {
        self.wishlist_ids.contains(product)
    }

    /// The cart line holding `product`, if any.
    #[must_use]
    pub fn cart_entry_for(&self, product: &ProductId) -> Option<&CartEntry> {
        self.cart.iter().find(|e| &e.product_id == product)
    }

    /// Total units across all cart lines.
    #[must_use]
    pub fn cart_units(&self) -> u32 {
        self.cart.iter().map(|e| e.quantity.get()).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_payload_json() -> serde_json::Value {
        serde_json::json!({
            "user": {
                "id": "u1",
                "username": "naveed",
                "email": "naveed@shop.in",
                "phone": 9_876_543_210_u64,
                "gender": "male",
                "wishlistIds": ["p2", "p1", "p2"],
                "cart": [{"_id": "c1", "productId": "p1", "quantity": 2}],
                "shippingAddresses": [{
                    "_id": "a1",
                    "name": "Naveed",
                    "phone": 9_876_543_210_u64,
                    "pincode": 560_001,
                    "locality": "MG Road",
                    "address": "12 Residency Rd",
                    "city": "Bengaluru",
                    "state": "Karnataka",
                    "addressType": "home",
                    "alternatePhone": null
                }]
            },
            "accessToken": "tok-1"
        })
    }

    pub(crate) fn sample_session() -> Session {
        let payload: AuthPayload = serde_json::from_value(sample_payload_json()).unwrap();
        Session::from_payload(payload)
    }

    #[test]
    fn test_session_from_payload() {
        let session = sample_session();
        assert_eq!(session.identity.id.as_str(), "u1");
        assert_eq!(session.identity.phone.as_deref(), Some("9876543210"));
        assert_eq!(session.identity.gender, Some(Gender::Male));
        assert_eq!(session.access_token().expose(), "tok-1");
        assert_eq!(session.wishlist_ids.len(), 2);
        assert!(session.in_wishlist(&ProductId::new("p1")));
        assert_eq!(session.cart_units(), 2);
        assert_eq!(session.shipping_addresses[0].pincode, "560001");
    }

    #[test]
    fn test_missing_collections_default_to_empty() {
        let payload: AuthPayload = serde_json::from_value(serde_json::json!({
            "user": {"_id": "u2", "username": "asha", "email": "asha@shop.in"},
            "accessToken": "tok"
        }))
        .unwrap();
        let session = Session::from_payload(payload);
        assert!(session.cart.is_empty());
        assert!(session.wishlist_ids.is_empty());
        assert!(session.identity.avatar.is_none());
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("super-secret");
        assert!(!format!("{token:?}").contains("super-secret"));
        assert_eq!(token.bearer(), "Bearer super-secret");
    }

    #[test]
    fn test_cart_quantity_above_ceiling_is_rejected() {
        let result: Result<CartEntry, _> = serde_json::from_value(serde_json::json!({
            "_id": "c1", "productId": "p1", "quantity": 7
        }));
        assert!(result.is_err());
    }
}
