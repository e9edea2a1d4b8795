//! Unified error handling with Sentry integration.
//!
//! Every SDK operation returns `Result<T, ApiError>`. The variants follow the
//! storefront's error taxonomy: the UI shows a toast for everything except
//! `AuthExpired`, which the request pipeline recovers from on its own.

use emporium_core::{EmailError, QuantityError};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Error type for all storefront API operations.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No response reached us (DNS, connect, timeout, reset).
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The access token was rejected as expired; recoverable via refresh.
    #[error("Access token expired")]
    AuthExpired,

    /// The durable session is invalid or absent; the user must log in again.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The backend rejected the request on a business rule.
    #[error("Validation failed ({status}): {message}")]
    ValidationFailed {
        /// HTTP status (200 for a `success: false` envelope).
        status: u16,
        /// Message from the response body.
        message: String,
    },

    /// The backend failed with a 5xx.
    #[error("Server fault ({status}): {message}")]
    ServerFault {
        /// HTTP status.
        status: u16,
        /// Message from the response body, if any.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// A newer request superseded this one.
    #[error("Request cancelled")]
    Cancelled,

    /// Cart quantity rejected before sending.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// Email rejected before sending.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Other form input rejected before sending.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Error body shape used by the backend: `{ "message": "..." }`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    /// Classify a non-success HTTP response.
    ///
    /// `expired_status` is the configured "access token expired" status and
    /// is checked before the generic 4xx mapping.
    #[must_use]
    pub fn from_status(status: StatusCode, body: &[u8], expired_status: StatusCode) -> Self {
        if status == expired_status {
            return Self::AuthExpired;
        }
        if status == StatusCode::UNAUTHORIZED {
            return Self::Unauthenticated;
        }

        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            });

        if status.is_server_error() {
            Self::ServerFault {
                status: status.as_u16(),
                message,
            }
        } else {
            Self::ValidationFailed {
                status: status.as_u16(),
                message,
            }
        }
    }

    /// Whether retrying later could succeed without user action.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::NetworkUnavailable(_) | Self::ServerFault { .. })
    }

    /// Whether the error was raised before any network call.
    #[must_use]
    pub const fn is_client_side(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuantity(_) | Self::InvalidEmail(_) | Self::InvalidInput(_)
        )
    }

    /// Text suitable for a toast or inline message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkUnavailable(_) => "Network connection problem...".to_string(),
            Self::ServerFault { .. } | Self::Decode(_) => "Something went wrong".to_string(),
            Self::AuthExpired | Self::Unauthenticated => {
                "Your session has ended, please log in again".to_string()
            }
            Self::ValidationFailed { message, .. } => message.clone(),
            Self::Cancelled => "Request cancelled".to_string(),
            Self::InvalidQuantity(e) => e.to_string(),
            Self::InvalidEmail(e) => e.to_string(),
            Self::InvalidInput(msg) => msg.clone(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::NetworkUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type alias for `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Set the Sentry user context after login or session restore.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout or forced logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for session lifecycle events.
///
/// ```rust,ignore
/// add_breadcrumb("session", "Access token refreshed", Some(&[("trigger", "pipeline")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPIRED: StatusCode = StatusCode::FORBIDDEN;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, b"", EXPIRED),
            ApiError::AuthExpired
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, b"", EXPIRED),
            ApiError::Unauthenticated
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, b"", EXPIRED),
            ApiError::ServerFault { status: 502, .. }
        ));
    }

    #[test]
    fn test_forbidden_is_plain_validation_when_expiry_uses_another_status() {
        let err = ApiError::from_status(
            StatusCode::FORBIDDEN,
            br#"{"message":"Admins only"}"#,
            StatusCode::from_u16(419).unwrap_or(StatusCode::FORBIDDEN),
        );
        assert_eq!(err.user_message(), "Admins only");
    }

    #[test]
    fn test_validation_message_from_body() {
        let err = ApiError::from_status(
            StatusCode::CONFLICT,
            br#"{"success":false,"message":"Email already registered"}"#,
            EXPIRED,
        );
        match err {
            ApiError::ValidationFailed { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "Email already registered");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_body_falls_back_to_reason() {
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, b"<html>", EXPIRED);
        assert_eq!(err.user_message(), "Bad Request");
    }

    #[test]
    fn test_transient_and_user_messages() {
        let net = ApiError::NetworkUnavailable("connection refused".to_string());
        assert!(net.is_transient());
        assert_eq!(net.user_message(), "Network connection problem...");

        let fault = ApiError::ServerFault {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(fault.is_transient());
        assert_eq!(fault.user_message(), "Something went wrong");

        assert!(!ApiError::Unauthenticated.is_transient());
        assert!(ApiError::InvalidInput("x".to_string()).is_client_side());
    }
}
