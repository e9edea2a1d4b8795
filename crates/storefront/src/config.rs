//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `EMPORIUM_API_URL` - Base URL of the storefront REST API
//!
//! ## Optional
//! - `EMPORIUM_STATE_DIR` - Directory for the persistent login flag (default: .emporium)
//! - `EMPORIUM_REQUEST_TIMEOUT_SECS` - Per-attempt HTTP timeout (default: 30)
//! - `EMPORIUM_CATALOG_CACHE_TTL_SECS` - Catalog cache TTL (default: 300)
//! - `EMPORIUM_AUTH_EXPIRED_STATUS` - Status the API uses for an expired access token (default: 403)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

const DEFAULT_STATE_DIR: &str = ".emporium";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CATALOG_CACHE_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Base URL of the REST API (always ends with `/`)
    pub api_base_url: Url,
    /// Directory holding the persistent login flag and cookie jar
    pub state_dir: PathBuf,
    /// Timeout applied to each HTTP attempt
    pub request_timeout: Duration,
    /// Time-to-live of cached catalog responses
    pub catalog_cache_ttl: Duration,
    /// Status code meaning "access token expired, refresh and retry"
    pub auth_expired_status: StatusCode,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl StorefrontConfig {
    /// Create a configuration for `api_base_url` with every optional value at its default.
    #[must_use]
    pub fn new(api_base_url: Url) -> Self {
        Self {
            api_base_url: with_trailing_slash(api_base_url),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_CACHE_TTL_SECS),
            auth_expired_status: StatusCode::FORBIDDEN,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup("EMPORIUM_API_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("EMPORIUM_API_URL".to_string()))?;
        let api_base_url = parse_api_url(&raw_url)?;

        let mut config = Self::new(api_base_url);

        if let Some(dir) = lookup("EMPORIUM_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("EMPORIUM_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = parse_secs("EMPORIUM_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("EMPORIUM_CATALOG_CACHE_TTL_SECS") {
            config.catalog_cache_ttl = parse_secs("EMPORIUM_CATALOG_CACHE_TTL_SECS", &secs)?;
        }
        if let Some(status) = lookup("EMPORIUM_AUTH_EXPIRED_STATUS") {
            config.auth_expired_status = parse_expired_status(&status)?;
        }
        config.sentry_dsn = lookup("SENTRY_DSN").filter(|dsn| !dsn.is_empty());
        config.sentry_environment = lookup("SENTRY_ENVIRONMENT");

        Ok(config)
    }

    /// Path of the persistent login flag file.
    #[must_use]
    pub fn login_flag_path(&self) -> PathBuf {
        self.state_dir.join(crate::session::LOGIN_FLAG_KEY)
    }

    /// Path of the persisted cookie jar holding the refresh credential.
    #[must_use]
    pub fn cookie_jar_path(&self) -> PathBuf {
        self.state_dir.join(crate::session::COOKIE_JAR_FILE)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse and validate the API base URL.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("EMPORIUM_API_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "EMPORIUM_API_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Relative joins drop the last path segment unless the base ends with `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// 401 is reserved for "not authenticated", so it cannot double as the expiry status.
fn parse_expired_status(value: &str) -> Result<StatusCode, ConfigError> {
    let key = "EMPORIUM_AUTH_EXPIRED_STATUS";
    let code = value
        .parse::<u16>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    let status = StatusCode::from_u16(code)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if status == StatusCode::UNAUTHORIZED || !status.is_client_error() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("{code} cannot signal an expired access token"),
        ));
    }
    Ok(status)
}
