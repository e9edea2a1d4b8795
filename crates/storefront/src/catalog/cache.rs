//! Cache types for public catalog responses.

use emporium_core::{CategoryId, ProductId};

use crate::models::{ChildCategory, ParentCategory, Product};

/// Cache key for products and categories.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    ParentCategories,
    ChildCategories(CategoryId),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    ParentCategories(Vec<ParentCategory>),
    ChildCategories(Vec<ChildCategory>),
}
