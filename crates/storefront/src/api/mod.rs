//! HTTP transport for the storefront REST API.
//!
//! # Architecture
//!
//! - One `reqwest::Client` per process with a shared cookie jar; the jar
//!   carries the HTTP-only refresh cookie, which this crate never reads
//! - Requests are described by [`ApiRequest`], a rebuildable value, so the
//!   request pipeline can resend the exact same request after a refresh
//! - Every response uses the `{ success, message, data }` envelope
//!
//! This layer only classifies responses. Attaching credentials and
//! recovering from expiry is the job of [`crate::auth::AuthorizedClient`].

pub mod request_id;

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, error};
use url::Url;

use crate::config::StorefrontConfig;
use crate::error::{ApiError, Result};
use crate::models::AccessToken;
use crate::session::CookieJar;

use request_id::REQUEST_ID_HEADER;

// =============================================================================
// Request Description
// =============================================================================

/// One field of a multipart form.
#[derive(Debug, Clone)]
pub enum MultipartField {
    /// Plain text field.
    Text {
        /// Field name.
        name: String,
        /// Field value.
        value: String,
    },
    /// File upload field.
    File {
        /// Field name.
        name: String,
        /// File name sent to the server.
        file_name: String,
        /// MIME type, e.g. `image/png`.
        mime: String,
        /// File contents.
        bytes: Vec<u8>,
    },
}

/// Body of an [`ApiRequest`].
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// JSON body.
    Json(serde_json::Value),
    /// `multipart/form-data` body.
    Multipart(Vec<MultipartField>),
}

/// A request to the storefront API, relative to the configured base URL.
///
/// Unlike `reqwest::Request` this can be sent any number of times.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: RequestBody,
    authorization: Option<String>,
}

impl ApiRequest {
    /// Create a request with no body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            authorization: None,
        }
    }

    /// `GET path`.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT path`.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `DELETE path`.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Decode` if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Set a multipart body.
    #[must_use]
    pub fn multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.body = RequestBody::Multipart(fields);
        self
    }

    /// Send this exact `Authorization` value instead of the session token.
    #[must_use]
    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    /// Drop a caller-supplied `Authorization` value so the session token is
    /// used instead.
    #[must_use]
    pub fn without_authorization(mut self) -> Self {
        self.authorization = None;
        self
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Path relative to the API base URL.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the caller supplied its own `Authorization` value.
    #[must_use]
    pub const fn has_authorization(&self) -> bool {
        self.authorization.is_some()
    }
}

// =============================================================================
// Response Envelope
// =============================================================================

/// `{ success, message, data }` wrapper used by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// Human-readable message from the server, shown as a toast.
    pub message: Option<String>,
    /// The `data` member, `null` if absent.
    pub data: serde_json::Value,
}

impl ApiResponse {
    /// Decode `data` into `T`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Decode` if `data` does not match `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.data).map_err(|e| {
            error!(error = %e, "Unexpected response data shape");
            ApiError::Decode(e.to_string())
        })
    }

    /// Like [`Self::decode`], but a missing `data` yields `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Decode` if `data` is present and does not match `T`.
    pub fn decode_or_default<T: DeserializeOwned + Default>(self) -> Result<T> {
        if self.data.is_null() {
            return Ok(T::default());
        }
        self.decode()
    }
}

// =============================================================================
// Client
// =============================================================================

/// Low-level client for the storefront REST API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    expired_status: StatusCode,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client that stores cookies in `jar`.
    ///
    /// A second client over the same jar, or over a jar reopened from the
    /// same file, behaves like a page reload: the durable refresh cookie
    /// survives, in-memory state does not.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NetworkUnavailable` if the HTTP client cannot be built.
    pub fn new(config: &StorefrontConfig, jar: Arc<CookieJar>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_provider(jar)
            .timeout(config.request_timeout)
            .user_agent(concat!("emporium/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_base_url.clone(),
                expired_status: config.auth_expired_status,
            }),
        })
    }

    /// Base URL of the API.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The status that means "access token expired".
    #[must_use]
    pub fn expired_status(&self) -> StatusCode {
        self.inner.expired_status
    }

    /// Absolute URL for `request`, including its query string.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidInput` if the path does not form a valid URL.
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        let mut url = self
            .inner
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidInput(format!("bad request path: {e}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }

    /// Send one attempt of `request`.
    ///
    /// `bearer` is attached as `Authorization: Bearer …` unless the request
    /// carries its own authorization value. Non-2xx statuses and
    /// `success: false` envelopes become errors.
    ///
    /// # Errors
    ///
    /// Returns the classified `ApiError` for the response.
    pub async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&AccessToken>,
        request_id: &str,
    ) -> Result<ApiResponse> {
        let url = self.url_for(request)?;

        let mut builder = self
            .inner
            .client
            .request(request.method.clone(), url)
            .header(REQUEST_ID_HEADER, request_id);

        if let Some(value) = &request.authorization {
            builder = builder.header(reqwest::header::AUTHORIZATION, value);
        } else if let Some(token) = bearer {
            builder = builder.header(reqwest::header::AUTHORIZATION, token.bearer());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(fields) => builder.multipart(build_form(fields)?),
        };

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            debug!(
                status = %status,
                method = %request.method,
                path = %request.path,
                "API returned non-success status"
            );
            return Err(ApiError::from_status(status, &body, self.inner.expired_status));
        }

        parse_envelope(status, &body)
    }
}

fn build_form(fields: &[MultipartField]) -> Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for field in fields {
        form = match field {
            MultipartField::Text { name, value } => form.text(name.clone(), value.clone()),
            MultipartField::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime)
                    .map_err(|e| ApiError::InvalidInput(format!("bad MIME type {mime}: {e}")))?;
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}

fn parse_envelope(status: StatusCode, body: &[u8]) -> Result<ApiResponse> {
    if body.is_empty() {
        return Ok(ApiResponse {
            message: None,
            data: serde_json::Value::Null,
        });
    }

    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| {
        error!(
            error = %e,
            body = %String::from_utf8_lossy(body).chars().take(500).collect::<String>(),
            "Failed to parse API response"
        );
        ApiError::Decode(e.to_string())
    })?;

    if envelope.success == Some(false) {
        return Err(ApiError::ValidationFailed {
            status: status.as_u16(),
            message: envelope
                .message
                .unwrap_or_else(|| "Request was rejected".to_string()),
        });
    }

    Ok(ApiResponse {
        message: envelope.message,
        data: envelope.data,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        let config = StorefrontConfig::new(Url::parse("http://localhost:8000/api/v1").unwrap());
        ApiClient::new(&config, Arc::new(CookieJar::in_memory())).unwrap()
    }

    #[test]
    fn test_url_for_joins_under_base_path() {
        let api = client();
        let url = api.url_for(&ApiRequest::get("/products/p1")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/v1/products/p1");
    }

    #[test]
    fn test_url_for_encodes_query() {
        let api = client();
        let request = ApiRequest::get("filteredProducts")
            .query("search", "red shoes")
            .query("brands", r#"["Nike"]"#);
        let url = api.url_for(&request).unwrap();
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("search".to_string(), "red shoes".to_string()));
        assert_eq!(pairs[1], ("brands".to_string(), r#"["Nike"]"#.to_string()));
    }

    #[test]
    fn test_without_authorization_falls_back_to_session_token() {
        let request = ApiRequest::get("products/wishlist").with_authorization("Bearer stale");
        assert!(request.has_authorization());

        let retry = request.clone().without_authorization();
        assert!(!retry.has_authorization());
        assert_eq!(retry.path(), request.path());
        assert_eq!(retry.method(), request.method());
    }

    #[test]
    fn test_envelope_success_false_is_validation_failure() {
        let err = parse_envelope(
            StatusCode::OK,
            br#"{"success":false,"message":"Invalid credentials"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::ValidationFailed { status: 200, ref message } if message == "Invalid credentials"));
    }

    #[test]
    fn test_envelope_data_is_decoded() {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "sessionId")]
            session_id: String,
        }
        let response = parse_envelope(
            StatusCode::OK,
            br#"{"success":true,"message":"ok","data":{"sessionId":"cs_1"}}"#,
        )
        .unwrap();
        assert_eq!(response.message.as_deref(), Some("ok"));
        assert_eq!(response.decode::<Data>().unwrap().session_id, "cs_1");
    }

    #[test]
    fn test_empty_body_is_null_data() {
        let response = parse_envelope(StatusCode::NO_CONTENT, b"").unwrap();
        assert!(response.data.is_null());
    }

    #[test]
    fn test_non_json_body_is_decode_error() {
        let err = parse_envelope(StatusCode::OK, b"<html>").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn test_request_is_rebuildable() {
        let request = ApiRequest::put("myProfile/picture/update").multipart(vec![
            MultipartField::File {
                name: "avatar".to_string(),
                file_name: "me.png".to_string(),
                mime: "image/png".to_string(),
                bytes: vec![1, 2, 3],
            },
        ]);
        assert!(build_form(match &request.body {
            RequestBody::Multipart(f) => f,
            _ => unreachable!(),
        })
        .is_ok());
        assert!(build_form(&[MultipartField::File {
            name: "avatar".to_string(),
            file_name: "x".to_string(),
            mime: "not a mime".to_string(),
            bytes: vec![],
        }])
        .is_err());
    }
}
