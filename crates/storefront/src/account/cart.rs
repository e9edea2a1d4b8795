//! Cart operations.
//!
//! Quantities stay within 1..=6; a change that would leave that range is
//! rejected before any network call.

use serde::Deserialize;
use tracing::{info, instrument};

use emporium_core::{ProductId, Quantity};

use crate::api::{ApiRequest, MultipartField};
use crate::error::{ApiError, Result};
use crate::models::{CartEntry, CartLine, CartSummary};

use super::AccountClient;

/// The cart page: populated lines and their totals.
#[derive(Debug, Clone)]
pub struct CartView {
    /// Lines with their products.
    pub lines: Vec<CartLine>,
    /// Totals.
    pub summary: CartSummary,
}

#[derive(Deserialize)]
struct CartUser {
    #[serde(default)]
    cart: Option<Vec<CartEntry>>,
}

#[derive(Deserialize, Default)]
struct CartMutation {
    #[serde(default)]
    user: Option<CartUser>,
}

impl CartMutation {
    fn into_cart(self) -> Option<Vec<CartEntry>> {
        self.user.and_then(|u| u.cart)
    }
}

fn cart_item_path(product: &ProductId) -> String {
    format!("user/cart/{}", urlencoding::encode(product.as_str()))
}

impl AccountClient {
    /// Load the cart with products populated.
    ///
    /// The store's cart is synced to the returned lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn cart(&self) -> Result<CartView> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            cart: Vec<CartLine>,
        }

        let response: Response = self
            .authorized
            .execute_json(&ApiRequest::get("products/cart"))
            .await?;

        self.store.set_cart(
            response
                .cart
                .iter()
                .map(|line| CartEntry {
                    id: line.id.clone(),
                    product_id: line.product.id.clone(),
                    quantity: line.quantity,
                })
                .collect(),
        );

        let summary = CartSummary::for_lines(&response.cart);
        Ok(CartView {
            lines: response.cart,
            summary,
        })
    }

    /// Add one unit of `product` to the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %product))]
    pub async fn add_to_cart(&self, product: &ProductId) -> Result<Option<String>> {
        self.set_quantity(product, Quantity::ONE).await
    }

    /// Change the quantity of `product` by `delta` units.
    ///
    /// # Errors
    ///
    /// - `ApiError::InvalidQuantity` if the result would leave 1..=6; no
    ///   request is sent.
    /// - `ApiError::InvalidInput` if the product is not in the cart.
    /// - `ApiError::Unauthenticated` if logged out.
    #[instrument(skip(self), fields(product_id = %product))]
    pub async fn change_quantity(&self, product: &ProductId, delta: i32) -> Result<Option<String>> {
        let session = self.session()?;
        let entry = session
            .cart_entry_for(product)
            .ok_or_else(|| ApiError::InvalidInput("Product is not in the cart".to_string()))?;
        let quantity = entry.quantity.step(delta)?;
        self.set_quantity(product, quantity).await
    }

    /// One more unit of `product`.
    ///
    /// # Errors
    ///
    /// See [`Self::change_quantity`].
    pub async fn increment(&self, product: &ProductId) -> Result<Option<String>> {
        self.change_quantity(product, 1).await
    }

    /// One fewer unit of `product`.
    ///
    /// # Errors
    ///
    /// See [`Self::change_quantity`].
    pub async fn decrement(&self, product: &ProductId) -> Result<Option<String>> {
        self.change_quantity(product, -1).await
    }

    async fn set_quantity(&self, product: &ProductId, quantity: Quantity) -> Result<Option<String>> {
        let request = ApiRequest::post(cart_item_path(product)).multipart(vec![MultipartField::Text {
            name: "quantity".to_string(),
            value: quantity.to_string(),
        }]);

        let response = self.authorized.execute(&request).await?;
        let message = response.message.clone();
        if let Some(cart) = response.decode_or_default::<CartMutation>()?.into_cart() {
            self.store.set_cart(cart);
        }
        info!(quantity = quantity.get(), "Cart quantity set");
        Ok(message)
    }

    /// Remove `product` from the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %product))]
    pub async fn remove_from_cart(&self, product: &ProductId) -> Result<Option<String>> {
        let local_entry = self
            .store
            .get()
            .and_then(|s| s.cart_entry_for(product).map(|e| e.id.clone()));

        let response = self
            .authorized
            .execute(&ApiRequest::delete(cart_item_path(product)))
            .await?;
        let message = response.message.clone();

        if let Some(id) = local_entry {
            self.store.remove_cart_item(&id);
        }
        if let Some(cart) = response.decode_or_default::<CartMutation>()?.into_cart() {
            self.store.set_cart(cart);
        }
        info!("Removed from cart");
        Ok(message)
    }
}
