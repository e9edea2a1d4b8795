//! Emporium Storefront client SDK.
//!
//! Owns the browser-side session lifecycle of the storefront: the in-memory
//! session store, the persistent login flag, credential refresh, the
//! authenticated request pipeline, start-up bootstrap and the route guard.
//! Catalog and account clients are built on top of them.
//!
//! Start from [`Storefront`], which wires every component around one shared
//! [`SessionStore`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod error;
pub mod filters;
pub mod guard;
pub mod models;
pub mod session;
pub mod state;

pub use bootstrap::{BootstrapOutcome, BootstrapPhase, SessionBootstrap};
pub use config::{ConfigError, StorefrontConfig};
pub use error::{ApiError, Result};
pub use guard::{Navigation, RouteGuard};
pub use session::{SessionState, SessionStore};
pub use state::{Storefront, StorefrontBuilder};
