//! Display helpers for prices and review timestamps.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use emporium_core::{CurrencyCode, Price};

/// Format a price in whole store-currency units with thousands separators.
///
/// `Price::from_units(24999)` renders as `₹24,999`.
#[must_use]
pub fn format_price(price: Price) -> String {
    let rounded = price
        .amount()
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let digits = rounded.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded < Decimal::ZERO { "-" } else { "" };
    format!("{sign}{}{grouped}", CurrencyCode::default().symbol())
}

/// Relative age of a timestamp, e.g. "3 hours ago".
///
/// The unit is picked from the elapsed duration. Timestamps in the future
/// read as "just now".
#[must_use]
pub fn time_ago(posted: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - posted).num_seconds();
    if seconds < 1 {
        return "just now".to_string();
    }

    let (count, unit) = match seconds {
        s if s < 60 => (s, "second"),
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 30 * 86_400 => (s / 86_400, "day"),
        s if s < 365 * 86_400 => (s / (30 * 86_400), "month"),
        s => (s / (365 * 86_400), "year"),
    };
    let plural = if count == 1 { "" } else { "s" };
    format!("{count} {unit}{plural} ago")
}

/// Average star rating as a one-decimal string, or `None` without reviews.
#[must_use]
pub fn average_rating(ratings: impl IntoIterator<Item = u8>) -> Option<String> {
    let (sum, count) = ratings
        .into_iter()
        .fold((0u32, 0u32), |(sum, count), r| (sum + u32::from(r), count + 1));
    if count == 0 {
        return None;
    }
    let average = (Decimal::from(sum) / Decimal::from(count)).round_dp(1);
    average.to_f64().map(|a| format!("{a:.1}"))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(Price::from_units(0)), "₹0");
        assert_eq!(format_price(Price::from_units(999)), "₹999");
        assert_eq!(format_price(Price::from_units(24_999)), "₹24,999");
        assert_eq!(format_price(Price::from_units(1_250_000)), "₹1,250,000");
        assert_eq!(format_price(Price::new(Decimal::new(17_991, 1))), "₹1,799");
        assert_eq!(format_price(Price::new(Decimal::new(17_995, 1))), "₹1,800");
    }

    #[test]
    fn test_time_ago_units() {
        let now = Utc::now();
        assert_eq!(time_ago(now - Duration::seconds(1), now), "1 second ago");
        assert_eq!(time_ago(now - Duration::seconds(45), now), "45 seconds ago");
        assert_eq!(time_ago(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(time_ago(now - Duration::hours(1), now), "1 hour ago");
        assert_eq!(time_ago(now - Duration::days(3), now), "3 days ago");
        assert_eq!(time_ago(now - Duration::days(65), now), "2 months ago");
        assert_eq!(time_ago(now - Duration::days(800), now), "2 years ago");
    }

    #[test]
    fn test_time_ago_crosses_boundaries() {
        // 23:59 to 00:01 the next day is two minutes, not a day.
        let posted = DateTime::parse_from_rfc3339("2024-12-31T23:59:00Z")
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_default();
        let now = posted + Duration::minutes(2);
        assert_eq!(time_ago(posted, now), "2 minutes ago");
        assert_eq!(time_ago(now, posted), "just now");
    }

    #[test]
    fn test_average_rating() {
        assert_eq!(average_rating([]), None);
        assert_eq!(average_rating([5, 4, 4]).as_deref(), Some("4.3"));
        assert_eq!(average_rating([3]).as_deref(), Some("3.0"));
    }
}
