//! Public catalog: products, categories and the filtered product listing.
//!
//! Product details and category lists are cached in memory with `moka` for
//! the configured TTL. Filtered listings are never cached; use
//! [`ProductSearch`] for "latest wins" listing queries.

mod cache;
mod filter;
mod search;

pub use filter::{MIN_PRICE_DISTANCE, PRICE_CEILING, PRICE_FLOOR, PriceRange, ProductFilter};
pub use search::ProductSearch;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Deserialize;
use tracing::{debug, instrument};

use emporium_core::{CategoryId, ProductId};

use crate::api::request_id::new_request_id;
use crate::api::{ApiClient, ApiRequest};
use crate::error::Result;
use crate::models::{ChildCategory, ParentCategory, Product, ProductPage};

use cache::{CacheKey, CacheValue};

/// Client for the public catalog endpoints.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    api: ApiClient,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("cached_entries", &self.inner.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl CatalogClient {
    /// Create a catalog client caching responses for `ttl`.
    #[must_use]
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(CatalogClientInner { api, cache }),
        }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        self.inner
            .api
            .send(request, None, &new_request_id())
            .await?
            .decode()
    }

    /// Get a product with its reviews.
    ///
    /// # Errors
    ///
    /// Returns an error if the product does not exist or the request fails.
    #[instrument(skip(self), fields(product_id = %id, request_id))]
    pub async fn product(&self, id: &ProductId) -> Result<Product> {
        #[derive(Deserialize)]
        struct Response {
            product: Product,
        }

        let cache_key = CacheKey::Product(id.clone());
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let request = ApiRequest::get(format!("products/{}", urlencoding::encode(id.as_str())));
        let response: Response = self.fetch(&request).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(response.product.clone())))
            .await;

        Ok(response.product)
    }

    /// Drop a cached product, e.g. after posting a review for it.
    pub async fn invalidate_product(&self, id: &ProductId) {
        self.inner
            .cache
            .invalidate(&CacheKey::Product(id.clone()))
            .await;
    }

    /// Get the top-level categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(request_id))]
    pub async fn parent_categories(&self) -> Result<Vec<ParentCategory>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            #[serde(default)]
            parent_categories: Vec<ParentCategory>,
        }

        if let Some(CacheValue::ParentCategories(categories)) =
            self.inner.cache.get(&CacheKey::ParentCategories).await
        {
            debug!("Cache hit for parent categories");
            return Ok(categories);
        }

        let response: Response = self.fetch(&ApiRequest::get("category/parent/public")).await?;

        self.inner
            .cache
            .insert(
                CacheKey::ParentCategories,
                CacheValue::ParentCategories(response.parent_categories.clone()),
            )
            .await;

        Ok(response.parent_categories)
    }

    /// Get the child categories of `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(parent_id = %parent, request_id))]
    pub async fn child_categories(&self, parent: &CategoryId) -> Result<Vec<ChildCategory>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            #[serde(default)]
            child_categories: Vec<ChildCategory>,
        }

        let cache_key = CacheKey::ChildCategories(parent.clone());
        if let Some(CacheValue::ChildCategories(categories)) = self.inner.cache.get(&cache_key).await
        {
            debug!("Cache hit for child categories");
            return Ok(categories);
        }

        let request = ApiRequest::get(format!(
            "category/child/public/{}",
            urlencoding::encode(parent.as_str())
        ));
        let response: Response = self.fetch(&request).await?;

        self.inner
            .cache
            .insert(
                cache_key,
                CacheValue::ChildCategories(response.child_categories.clone()),
            )
            .await;

        Ok(response.child_categories)
    }

    /// Find a parent category by display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the category list cannot be loaded.
    pub async fn parent_category_named(&self, name: &str) -> Result<Option<ParentCategory>> {
        Ok(self
            .parent_categories()
            .await?
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    /// Get products matching `filter`, plus the brands available for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip_all, fields(request_id))]
    pub async fn filtered_products(&self, filter: &ProductFilter) -> Result<ProductPage> {
        self.fetch(&filter.to_request()).await
    }
}
