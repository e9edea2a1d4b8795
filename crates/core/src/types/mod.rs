//! Core types for Emporium.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod profile;
pub mod quantity;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, DiscountPercent, Price};
pub use profile::{AddressType, Gender};
pub use quantity::{Quantity, QuantityError};
