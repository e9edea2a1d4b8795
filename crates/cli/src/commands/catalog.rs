//! One-shot catalog commands.

use clap::Args;

use emporium_core::{CategoryId, ProductId};
use emporium_storefront::Storefront;
use emporium_storefront::catalog::ProductFilter;

use super::{CliError, say};
use crate::render;

/// Filters for the `products` command.
#[derive(Debug, Default, Args)]
pub struct ProductsArgs {
    /// Free-text search
    #[arg(short, long)]
    pub search: Option<String>,

    /// Parent category name, e.g. "Men"
    #[arg(short, long)]
    pub category: Option<String>,

    /// Child category ID
    #[arg(long)]
    pub child: Option<String>,

    /// Brand (repeatable)
    #[arg(short, long)]
    pub brand: Vec<String>,

    /// Minimum discount percentage
    #[arg(short, long)]
    pub discount: Option<u8>,

    /// Minimum price
    #[arg(long = "min-price")]
    pub min: Option<u32>,

    /// Maximum price
    #[arg(long = "max-price")]
    pub max: Option<u32>,

    /// Featured products only
    #[arg(long)]
    pub featured: bool,

    /// New arrivals only
    #[arg(long)]
    pub new_arrivals: bool,
}

impl ProductsArgs {
    /// Build a filter, resolving the category name against the catalog.
    async fn to_filter(&self, storefront: &Storefront) -> Result<ProductFilter, CliError> {
        let mut filter = ProductFilter::default();
        filter.search = self.search.clone().filter(|s| !s.trim().is_empty());
        filter.featured = self.featured;
        filter.new_arrivals = self.new_arrivals;

        if let Some(name) = &self.category {
            let parent = storefront
                .catalog()
                .parent_category_named(name)
                .await?
                .ok_or_else(|| CliError::Usage(format!("Unknown category: {name}")))?;
            filter.parent_category = Some(parent.id);
        }
        if let Some(child) = &self.child {
            filter.set_child_category(CategoryId::new(child.clone()));
        }
        for brand in &self.brand {
            filter.toggle_brand(brand);
        }
        if let Some(discount) = self.discount {
            filter.toggle_discount(discount);
        }
        if let Some(max) = self.max {
            filter.price.set_max(max);
        }
        if let Some(min) = self.min {
            filter.price.set_min(min);
        }
        Ok(filter)
    }
}

/// Print the filtered product listing.
///
/// # Errors
///
/// Returns an error if the category is unknown or the request fails.
pub async fn products(storefront: &Storefront, args: ProductsArgs) -> Result<(), CliError> {
    let filter = args.to_filter(storefront).await?;
    let page = storefront.search().search(&filter).await?;

    if page.filtered_products.is_empty() {
        say("No products match");
        return Ok(());
    }
    for product in &page.filtered_products {
        say(render::product_line(product));
    }
    if !page.brands.is_empty() {
        say(format!("\nBrands: {}", page.brands.join(", ")));
    }
    Ok(())
}

/// Print one product.
///
/// # Errors
///
/// Returns an error if the request fails.
pub async fn product(storefront: &Storefront, id: &str) -> Result<(), CliError> {
    let product = storefront.catalog().product(&ProductId::new(id)).await?;
    say(render::product_detail(&product, chrono::Utc::now()));
    Ok(())
}

/// Print the category tree.
///
/// # Errors
///
/// Returns an error if a request fails.
pub async fn categories(storefront: &Storefront) -> Result<(), CliError> {
    let catalog = storefront.catalog();
    let mut tree = Vec::new();
    for parent in catalog.parent_categories().await? {
        let children = catalog.child_categories(&parent.id).await?;
        tree.push((parent, children));
    }
    say(render::categories(&tree));
    Ok(())
}
