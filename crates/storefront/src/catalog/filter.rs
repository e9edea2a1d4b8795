//! Product list filter.
//!
//! Mirrors the filter sidebar: search text, category, brands, discount,
//! featured/new-arrival toggles and a price range slider with a minimum gap
//! between its thumbs.

use emporium_core::CategoryId;

use crate::api::ApiRequest;

/// Lowest selectable price.
pub const PRICE_FLOOR: u32 = 0;
/// Highest selectable price.
pub const PRICE_CEILING: u32 = 30_000;
/// Minimum gap between the lower and upper price bounds.
pub const MIN_PRICE_DISTANCE: u32 = 1_000;

/// Price range with `max - min >= MIN_PRICE_DISTANCE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceRange {
    min: u32,
    max: u32,
}

impl Default for PriceRange {
    fn default() -> Self {
        Self {
            min: PRICE_FLOOR,
            max: PRICE_CEILING,
        }
    }
}

impl PriceRange {
    /// Lower bound.
    #[must_use]
    pub const fn min(&self) -> u32 {
        self.min
    }

    /// Upper bound.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Move the lower thumb. It stops `MIN_PRICE_DISTANCE` below the upper one.
    pub fn set_min(&mut self, value: u32) {
        self.min = value.min(self.max.saturating_sub(MIN_PRICE_DISTANCE));
    }

    /// Move the upper thumb. It stops `MIN_PRICE_DISTANCE` above the lower one.
    pub fn set_max(&mut self, value: u32) {
        self.max = value
            .min(PRICE_CEILING)
            .max(self.min + MIN_PRICE_DISTANCE);
    }

    /// Whether this is the full, unfiltered range.
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Filter for the product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductFilter {
    /// Free-text search.
    pub search: Option<String>,
    /// Parent category.
    pub parent_category: Option<CategoryId>,
    /// Child category.
    pub child_category: Option<CategoryId>,
    brands: Vec<String>,
    discount: u8,
    /// Only featured products.
    pub featured: bool,
    /// Only new arrivals.
    pub new_arrivals: bool,
    /// Price range.
    pub price: PriceRange,
}

impl ProductFilter {
    /// Selected brands, in selection order.
    #[must_use]
    pub fn brands(&self) -> &[String] {
        &self.brands
    }

    /// Minimum discount percentage (0 = any).
    #[must_use]
    pub const fn discount(&self) -> u8 {
        self.discount
    }

    /// Select or deselect a brand.
    pub fn toggle_brand(&mut self, brand: &str) {
        if let Some(index) = self.brands.iter().position(|b| b == brand) {
            self.brands.remove(index);
        } else {
            self.brands.push(brand.to_string());
        }
    }

    /// Select a minimum discount; selecting the active one clears it.
    pub fn toggle_discount(&mut self, percent: u8) {
        self.discount = if self.discount == percent { 0 } else { percent.min(100) };
    }

    /// Pick a child category. Brand choices belong to the old category and are dropped.
    pub fn set_child_category(&mut self, id: CategoryId) {
        self.child_category = Some(id);
        self.brands.clear();
    }

    /// Drop category and brand selections.
    pub fn clear_categories(&mut self) {
        self.parent_category = None;
        self.child_category = None;
        self.brands.clear();
    }

    /// Reset the price range.
    pub fn clear_price(&mut self) {
        self.price = PriceRange::default();
    }

    /// The `GET /filteredProducts` request for this filter.
    #[must_use]
    pub fn to_request(&self) -> ApiRequest {
        let brands = if self.brands.is_empty() {
            "null".to_string()
        } else {
            serde_json::to_string(&self.brands).unwrap_or_else(|_| "null".to_string())
        };
        let flag = |on: bool| if on { "true" } else { "null" };

        ApiRequest::get("filteredProducts")
            .query("search", self.search.as_deref().unwrap_or_default())
            .query(
                "parentCategoryId",
                self.parent_category.as_ref().map_or("", |c| c.as_str()),
            )
            .query(
                "childCategoryId",
                self.child_category.as_ref().map_or("", |c| c.as_str()),
            )
            .query("brands", brands)
            .query("discount", self.discount.to_string())
            .query("featured", flag(self.featured))
            .query("newArrivals", flag(self.new_arrivals))
            .query("minPrice", self.price.min.to_string())
            .query("maxPrice", self.price.max.to_string())
    }
}
