//! Plain-text rendering of storefront data.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use emporium_storefront::account::CartView;
use emporium_storefront::filters::{average_rating, format_price, time_ago};
use emporium_storefront::models::{ChildCategory, ParentCategory, Product, Session, ShippingAddress};

/// One-line product summary for listings.
pub fn product_line(product: &Product) -> String {
    let mut line = format!("{:<26} {}", product.id, product.title);
    let sale = product.sale_price();
    if sale == product.price {
        let _ = write!(line, "  {}", format_price(sale));
    } else {
        let _ = write!(
            line,
            "  {} (was {}, {}% off)",
            format_price(sale),
            format_price(product.price),
            product.discount.percent().normalize()
        );
    }
    if !product.in_stock() {
        line.push_str("  [out of stock]");
    }
    line
}

/// Full product page including reviews.
pub fn product_detail(product: &Product, now: DateTime<Utc>) -> String {
    let mut out = product_line(product);
    out.push('\n');
    if !product.description.is_empty() {
        let _ = writeln!(out, "\n{}", product.description);
    }
    if let Some(color) = &product.color {
        let _ = writeln!(out, "Colour: {}", color.name);
    }
    if let Some(unit) = &product.unit {
        let _ = writeln!(out, "Size: {}", unit.name);
    }

    match average_rating(product.reviews.iter().map(|r| r.num_rating)) {
        None => out.push_str("\nNo reviews yet\n"),
        Some(avg) => {
            let _ = writeln!(out, "\n{avg}/5 from {} reviews", product.reviews.len());
            for review in &product.reviews {
                let when = review
                    .posted_at
                    .map(|posted| time_ago(posted, now))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "  {} ({}/5) {when}\n    {}",
                    review.username, review.num_rating, review.comment
                );
            }
        }
    }
    out
}

/// Parent categories, each followed by its children if loaded.
pub fn categories(tree: &[(ParentCategory, Vec<ChildCategory>)]) -> String {
    let mut out = String::new();
    for (parent, children) in tree {
        let _ = writeln!(out, "{} [{}]", parent.name, parent.id);
        for child in children {
            let _ = writeln!(out, "  {} [{}]", child.name, child.id);
        }
    }
    out
}

/// Cart lines with totals.
pub fn cart(view: &CartView) -> String {
    if view.lines.is_empty() {
        return "Your cart is empty".to_string();
    }
    let mut out = String::new();
    for line in &view.lines {
        let _ = writeln!(
            out,
            "{} x{}  {}",
            product_line(&line.product),
            line.quantity,
            format_price(line.product.sale_price() * line.quantity.get())
        );
    }
    let summary = &view.summary;
    let _ = writeln!(out, "Price ({} items): {}", summary.lines, format_price(summary.total_price));
    let _ = writeln!(out, "Discount: -{}", format_price(summary.total_discount));
    let _ = write!(out, "Total: {}", format_price(summary.payable()));
    out
}

/// Saved shipping addresses.
pub fn addresses(list: &[ShippingAddress]) -> String {
    if list.is_empty() {
        return "No saved addresses".to_string();
    }
    let mut out = String::new();
    for a in list {
        let _ = writeln!(
            out,
            "{} [{}] {}, {}, {}, {}, {} - {} ({})",
            a.name, a.id, a.address, a.locality, a.city, a.state, a.pincode, a.phone, a.address_type
        );
    }
    out.trim_end().to_string()
}

/// Who is logged in.
pub fn identity(session: &Session) -> String {
    let who = &session.identity;
    let mut out = format!("{} <{}>", who.username, who.email);
    if let Some(phone) = &who.phone {
        let _ = write!(out, " {phone}");
    }
    let _ = write!(
        out,
        "\n{} in cart, {} wishlisted, {} addresses",
        session.cart_units(),
        session.wishlist_ids.len(),
        session.shipping_addresses.len()
    );
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(discount: u32, stock: u32) -> Product {
        serde_json::from_value(serde_json::json!({
            "_id": "p1",
            "title": "Linen Shirt",
            "price": 2000,
            "discount": discount,
            "stock": stock,
            "reviews": [
                {"userId": "u1", "username": "asha", "numRating": 4, "comment": "Nice fit",
                 "postedAt": "2024-06-01T10:00:00Z"},
                {"userId": "u2", "username": "ravi", "numRating": 5, "comment": "Great"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_product_line_discount() {
        let line = product_line(&product(10, 3));
        assert!(line.contains("Linen Shirt"));
        assert!(line.contains("₹1,800 (was ₹2,000, 10% off)"));
        assert!(!line.contains("out of stock"));
    }

    #[test]
    fn test_product_line_out_of_stock() {
        let line = product_line(&product(0, 0));
        assert!(line.contains("₹2,000"));
        assert!(line.ends_with("[out of stock]"));
    }

    #[test]
    fn test_product_detail_reviews() {
        let now = "2024-06-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let detail = product_detail(&product(0, 1), now);
        assert!(detail.contains("4.5/5 from 2 reviews"));
        assert!(detail.contains("asha (4/5) 2 hours ago"));
    }
}
