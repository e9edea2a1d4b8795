//! Checkout session creation.
//!
//! The returned session ID is handed to the payment provider by the caller.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use emporium_core::AddressId;

use crate::api::ApiRequest;
use crate::error::{ApiError, Result};
use crate::models::{CartEntry, ShippingAddress};

use super::AccountClient;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutBody<'a> {
    selected_address: &'a ShippingAddress,
    cart: &'a [CartEntry],
}

impl AccountClient {
    /// Create a payment checkout session for the cart, shipping to `address`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidInput` before any network call if the cart is
    /// empty or the address is unknown, or the request error.
    #[instrument(skip(self), fields(address_id = %address))]
    pub async fn create_checkout_session(&self, address: &AddressId) -> Result<String> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            session_id: String,
        }

        let session = self.session()?;
        if session.cart.is_empty() {
            return Err(ApiError::InvalidInput("Your cart is empty".to_string()));
        }
        let selected = session
            .shipping_addresses
            .iter()
            .find(|a| &a.id == address)
            .ok_or_else(|| ApiError::InvalidInput("Select a saved address".to_string()))?;

        let request = ApiRequest::post("create-checkout-session").json(&CheckoutBody {
            selected_address: selected,
            cart: &session.cart,
        })?;
        let response: Response = self.authorized.execute_json(&request).await?;

        info!("Checkout session created");
        Ok(response.session_id)
    }
}
