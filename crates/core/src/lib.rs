//! Emporium Core - Shared domain types.
//!
//! This crate provides the types shared by every Emporium component:
//! - `storefront` - Client SDK for the storefront REST API
//! - `cli` - Interactive shell and catalog commands
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no HTTP
//! clients, no async. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, prices, cart quantities and profile enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
