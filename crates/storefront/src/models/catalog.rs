//! Catalog types: products, categories, reviews and populated cart lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use emporium_core::{CartEntryId, CategoryId, DiscountPercent, ImageId, Price, ProductId, Quantity, UserId};

// =============================================================================
// Product Types
// =============================================================================

/// Product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    /// Image document ID.
    #[serde(rename = "_id", default)]
    pub id: Option<ImageId>,
    /// Image URL.
    pub url: String,
}

/// Color or unit swatch attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Swatch {
    /// Display name.
    pub name: String,
    /// Color hex or unit value.
    pub value: String,
    /// Abbreviation (units only).
    #[serde(default)]
    pub short_hand: Option<String>,
}

/// A product as returned by the catalog endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product document ID.
    #[serde(rename = "_id")]
    pub id: ProductId,
    /// Product title.
    pub title: String,
    /// Long description.
    #[serde(default)]
    pub description: String,
    /// List price.
    pub price: Price,
    /// Units in stock.
    #[serde(default)]
    pub stock: u32,
    /// Discount percentage off the list price.
    #[serde(default)]
    pub discount: DiscountPercent,
    /// Gallery images, first is the cover.
    #[serde(default)]
    pub images: Vec<ProductImage>,
    /// Average rating.
    #[serde(default)]
    pub num_rating: Option<f64>,
    /// Leaf category.
    #[serde(default)]
    pub category: Option<ChildCategory>,
    /// Color swatch.
    #[serde(default)]
    pub color: Option<Swatch>,
    /// Unit swatch.
    #[serde(default)]
    pub unit: Option<Swatch>,
    /// Customer reviews.
    #[serde(default)]
    pub reviews: Vec<Review>,
    /// Whether the product is featured on the home page.
    #[serde(default)]
    pub featured: bool,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Price after discount.
    #[must_use]
    pub fn sale_price(&self) -> Price {
        self.price.discounted(self.discount)
    }

    /// Cover image URL.
    #[must_use]
    pub fn cover_image(&self) -> Option<&str> {
        self.images.first().map(|i| i.url.as_str())
    }

    /// The review written by `user`, if any.
    #[must_use]
    pub fn review_by(&self, user: &UserId) -> Option<&Review> {
        self.reviews.iter().find(|r| r.author.id() == user)
    }

    /// Whether any units are available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

// =============================================================================
// Review Types
// =============================================================================

/// Review author reference: either a bare user ID or a populated user document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorRef {
    /// Bare user ID.
    Id(UserId),
    /// Populated user document.
    Populated {
        /// User ID.
        #[serde(rename = "_id")]
        id: UserId,
    },
}

impl AuthorRef {
    /// The author's user ID.
    #[must_use]
    pub const fn id(&self) -> &UserId {
        match self {
            Self::Id(id) | Self::Populated { id } => id,
        }
    }
}

/// A customer review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Who wrote it.
    #[serde(rename = "userId")]
    pub author: AuthorRef,
    /// Author display name.
    #[serde(default)]
    pub username: String,
    /// Star rating 1..=5.
    pub num_rating: u8,
    /// Review text.
    #[serde(default)]
    pub comment: String,
    /// When it was posted.
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Category Types
// =============================================================================

/// Top-level category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentCategory {
    /// Category document ID.
    #[serde(rename = "_id")]
    pub id: CategoryId,
    /// Category name.
    pub name: String,
}

/// Reference to a parent category: bare ID or populated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    /// Bare category ID.
    Id(CategoryId),
    /// Populated category document.
    Populated(ParentCategory),
}

/// Leaf category under a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildCategory {
    /// Category document ID.
    #[serde(rename = "_id")]
    pub id: CategoryId,
    /// Category name.
    pub name: String,
    /// Parent category.
    #[serde(default)]
    pub parent_category: Option<CategoryRef>,
}

/// `data` payload of the filtered products endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    /// Products matching the filter.
    #[serde(default)]
    pub filtered_products: Vec<Product>,
    /// Brands available under the current category filter.
    #[serde(default)]
    pub brands: Vec<String>,
}

// =============================================================================
// Cart Types
// =============================================================================

/// A cart line with its product populated.
#[derive(Debug, Clone, Deserialize)]
pub struct CartLine {
    /// Cart entry document ID.
    #[serde(rename = "_id")]
    pub id: CartEntryId,
    /// The product.
    #[serde(rename = "productId")]
    pub product: Product,
    /// Units, always 1..=6.
    pub quantity: Quantity,
}

/// Totals shown on the cart page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSummary {
    /// Number of lines.
    pub lines: usize,
    /// Sum of list price times quantity.
    pub total_price: Price,
    /// Sum of discount amounts times quantity.
    pub total_discount: Price,
}

impl CartSummary {
    /// Compute totals for a set of populated lines.
    #[must_use]
    pub fn for_lines(lines: &[CartLine]) -> Self {
        Self {
            lines: lines.len(),
            total_price: lines
                .iter()
                .map(|l| l.product.price * l.quantity.get())
                .sum(),
            total_discount: lines
                .iter()
                .map(|l| l.product.price.discount_amount(l.product.discount) * l.quantity.get())
                .sum(),
        }
    }

    /// What the customer pays.
    #[must_use]
    pub fn payable(&self) -> Price {
        self.total_price - self.total_discount
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn product_json(id: &str, price: u32, discount: u32) -> serde_json::Value {
        serde_json::json!({
            "_id": id,
            "title": format!("Product {id}"),
            "description": "",
            "price": price,
            "stock": 10,
            "discount": discount,
            "images": [{"_id": "img1", "url": format!("https://cdn.shop/{id}.jpg")}],
            "reviews": [
                {"userId": {"_id": "u1"}, "username": "naveed", "numRating": 4, "comment": "Good",
                 "postedAt": "2024-01-05T10:00:00Z"},
                {"userId": "u2", "username": "asha", "numRating": 5, "comment": "Great"}
            ],
            "featured": false
        })
    }

    #[test]
    fn test_product_decodes_with_mixed_author_refs() {
        let product: Product = serde_json::from_value(product_json("p1", 1000, 10)).unwrap();
        assert_eq!(product.review_by(&UserId::new("u1")).unwrap().num_rating, 4);
        assert_eq!(product.review_by(&UserId::new("u2")).unwrap().comment, "Great");
        assert!(product.review_by(&UserId::new("u3")).is_none());
        assert_eq!(product.cover_image(), Some("https://cdn.shop/p1.jpg"));
        assert_eq!(product.sale_price(), Price::from_units(900));
    }

    #[test]
    fn test_cart_summary() {
        let lines: Vec<CartLine> = serde_json::from_value(serde_json::json!([
            {"_id": "c1", "productId": product_json("p1", 1000, 10), "quantity": 2},
            {"_id": "c2", "productId": product_json("p2", 500, 0), "quantity": 1}
        ]))
        .unwrap();
        let summary = CartSummary::for_lines(&lines);
        assert_eq!(summary.lines, 2);
        assert_eq!(summary.total_price, Price::from_units(2500));
        assert_eq!(summary.total_discount, Price::from_units(200));
        assert_eq!(summary.payable(), Price::from_units(2300));
    }

    #[test]
    fn test_child_category_parent_ref() {
        let child: ChildCategory = serde_json::from_value(serde_json::json!({
            "_id": "c1", "name": "Phones", "parentCategory": {"_id": "p1", "name": "Electronics"}
        }))
        .unwrap();
        assert!(matches!(child.parent_category, Some(CategoryRef::Populated(ref p)) if p.name == "Electronics"));
    }
}
