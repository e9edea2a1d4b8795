//! Wishlist operations.

use serde::Deserialize;
use tracing::instrument;

use emporium_core::ProductId;

use crate::api::ApiRequest;
use crate::error::Result;
use crate::models::Product;

use super::AccountClient;

impl AccountClient {
    /// Load wishlisted products.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn wishlist(&self) -> Result<Vec<Product>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            #[serde(default)]
            wishlist_products: Vec<Product>,
        }

        let response: Response = self
            .authorized
            .execute_json(&ApiRequest::get("products/wishlist"))
            .await?;
        Ok(response.wishlist_products)
    }

    /// Add `product` to the wishlist, or remove it if already there.
    ///
    /// Returns whether the product is on the wishlist afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %product))]
    pub async fn toggle_wishlist(&self, product: &ProductId) -> Result<bool> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct User {
            #[serde(default)]
            wishlist_ids: Option<Vec<ProductId>>,
        }

        #[derive(Deserialize, Default)]
        struct Response {
            #[serde(default)]
            user: Option<User>,
        }

        let was_listed = self.session()?.in_wishlist(product);

        let request = ApiRequest::post(format!(
            "user/wishlist/{}",
            urlencoding::encode(product.as_str())
        ));
        let response: Response = self
            .authorized
            .execute(&request)
            .await?
            .decode_or_default()?;

        match response.user.and_then(|u| u.wishlist_ids) {
            Some(ids) => self.store.set_wishlist_ids(ids),
            None if was_listed => self.store.remove_wishlist_id(product),
            None => self.store.add_wishlist_id(product.clone()),
        }

        Ok(self.store.get().is_some_and(|s| s.in_wishlist(product)))
    }
}
