//! Profile and avatar updates.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use emporium_core::{Email, Gender};

use crate::api::{ApiRequest, MultipartField};
use crate::error::{ApiError, Result};
use crate::models::Identity;

use super::{AccountClient, require_digits, require_text};

/// Largest accepted avatar upload.
const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Personal information form.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    /// Display name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Phone, digits only.
    pub phone: Option<String>,
    /// Gender.
    pub gender: Option<Gender>,
}

/// A picture to use as the avatar.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    /// File name.
    pub file_name: String,
    /// MIME type, must be `image/*`.
    pub mime: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

#[derive(Serialize)]
struct ProfileBody<'a> {
    username: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gender: Option<Gender>,
}

/// `data.user` of profile responses. Only the identity fields are used.
#[derive(Deserialize)]
struct ProfileUser {
    username: String,
    email: Email,
    #[serde(default, deserialize_with = "crate::models::string_or_number")]
    phone: Option<String>,
    #[serde(default, deserialize_with = "crate::models::lenient_parse")]
    gender: Option<Gender>,
    #[serde(default)]
    avatar: Option<String>,
}

#[derive(Deserialize)]
struct ProfileResponse {
    user: ProfileUser,
}

impl AccountClient {
    /// Update personal information.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidEmail` or `ApiError::InvalidInput` before any
    /// network call if the form is invalid, or the request error.
    #[instrument(skip_all)]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Identity> {
        require_text("Username", &update.username)?;
        let email = Email::parse(&update.email)?;
        let phone = update.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());
        if let Some(phone) = phone {
            require_digits("Phone", phone)?;
        }
        let current = self.session()?;

        let request = ApiRequest::put("myProfile/update").json(&ProfileBody {
            username: update.username.trim(),
            email: email.as_str(),
            phone,
            gender: update.gender,
        })?;
        let response: ProfileResponse = self.authorized.execute_json(&request).await?;

        let identity = Identity {
            id: current.identity.id.clone(),
            username: response.user.username,
            avatar: response.user.avatar.or_else(|| current.identity.avatar.clone()),
            email: response.user.email,
            phone: response.user.phone,
            gender: response.user.gender,
        };
        self.store.update_identity(identity.clone());
        info!("Profile updated");
        Ok(identity)
    }

    /// Upload a new avatar picture.
    ///
    /// Returns the new avatar URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidInput` before any network call for a
    /// non-image or oversized file, or the request error.
    #[instrument(skip_all, fields(file_name = %upload.file_name, size = upload.bytes.len()))]
    pub async fn update_avatar(&self, upload: AvatarUpload) -> Result<Option<String>> {
        if !upload.mime.starts_with("image/") {
            return Err(ApiError::InvalidInput("Avatar must be an image".to_string()));
        }
        if upload.bytes.is_empty() || upload.bytes.len() > MAX_AVATAR_BYTES {
            return Err(ApiError::InvalidInput(
                "Avatar must be between 1 byte and 5 MB".to_string(),
            ));
        }

        let request = ApiRequest::put("myProfile/picture/update").multipart(vec![MultipartField::File {
            name: "avatar".to_string(),
            file_name: upload.file_name,
            mime: upload.mime,
            bytes: upload.bytes,
        }]);
        let response: ProfileResponse = self.authorized.execute_json(&request).await?;

        self.store.set_avatar(response.user.avatar.clone());
        info!("Avatar updated");
        Ok(response.user.avatar)
    }
}
