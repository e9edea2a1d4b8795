//! Domain models for the storefront API.
//!
//! Wire shapes follow the backend's JSON (camelCase keys, `_id` for document
//! ids). Optional and loosely-typed fields are decoded leniently so that one
//! odd value does not fail a whole catalog page.

pub mod catalog;
pub mod session;

pub use catalog::*;
pub use session::*;

use serde::{Deserialize, Deserializer};

/// Decode a field the backend sends either as a JSON number or a string
/// (phone numbers, pincodes). `null` and empty strings become `None`.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Like [`string_or_number`] for fields that must be present.
pub(crate) fn required_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    string_or_number(deserializer)?
        .ok_or_else(|| serde::de::Error::custom("expected a string or number"))
}

/// Decode an optional enum from its string form, mapping unknown values to `None`.
pub(crate) fn lenient_parse<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|s| s.parse().ok()))
}
