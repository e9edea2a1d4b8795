//! Product reviews.

use serde::Serialize;
use tracing::{info, instrument};

use emporium_core::ProductId;

use crate::api::ApiRequest;
use crate::error::{ApiError, Result};

use super::{AccountClient, require_text};

/// Review form input.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    /// Star rating, 1..=5.
    pub num_rating: u8,
    /// Review text.
    pub comment: String,
}

impl ReviewInput {
    /// Check the rating range and that a comment was written.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidInput`.
    pub fn validate(&self) -> Result<()> {
        if !(1..=5).contains(&self.num_rating) {
            return Err(ApiError::InvalidInput(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        require_text("Review", &self.comment)
    }
}

impl AccountClient {
    /// Post or replace the current user's review of `product`.
    ///
    /// The cached product is dropped so the next load shows the review.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidInput` before any network call, or the
    /// request error.
    #[instrument(skip(self, input), fields(product_id = %product, rating = input.num_rating))]
    pub async fn submit_review(&self, product: &ProductId, input: &ReviewInput) -> Result<Option<String>> {
        input.validate()?;
        let request = ApiRequest::post(format!(
            "product/review/{}",
            urlencoding::encode(product.as_str())
        ))
        .json(input)?;

        let response = self.authorized.execute(&request).await?;
        self.catalog.invalidate_product(product).await;
        info!("Review submitted");
        Ok(response.message)
    }
}
