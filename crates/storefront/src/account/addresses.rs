//! Shipping address book.
//!
//! The server returns the whole list after every change, and the store's
//! list is replaced with it wholesale.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use emporium_core::{AddressId, AddressType};

use crate::api::ApiRequest;
use crate::error::Result;
use crate::models::ShippingAddress;

use super::{AccountClient, require_digits, require_text};

/// Address form input.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    /// Recipient name.
    pub name: String,
    /// Contact phone, digits only.
    pub phone: String,
    /// Postal code, digits only.
    pub pincode: String,
    /// Locality or neighbourhood.
    pub locality: String,
    /// Street address.
    pub address: String,
    /// City.
    pub city: String,
    /// State.
    pub state: String,
    /// Home or work.
    pub address_type: AddressType,
    /// Optional second phone, digits only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_phone: Option<String>,
}

impl AddressInput {
    /// Check required fields and numeric formats.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidInput` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        require_text("Name", &self.name)?;
        require_digits("Phone", &self.phone)?;
        require_digits("Pincode", &self.pincode)?;
        require_text("Locality", &self.locality)?;
        require_text("Address", &self.address)?;
        require_text("City", &self.city)?;
        require_text("State", &self.state)?;
        if let Some(alt) = self.alternate_phone.as_deref().filter(|p| !p.trim().is_empty()) {
            require_digits("Alternate phone", alt)?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressUser {
    shipping_addresses: Vec<ShippingAddress>,
}

#[derive(Deserialize)]
struct AddressResponse {
    user: AddressUser,
}

impl AccountClient {
    /// Saved addresses from the current session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthenticated` if logged out.
    pub fn addresses(&self) -> Result<Vec<ShippingAddress>> {
        Ok(self.session()?.shipping_addresses.clone())
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidInput` before any network call if the form is
    /// invalid, or the request error.
    #[instrument(skip_all)]
    pub async fn add_address(&self, input: &AddressInput) -> Result<Option<String>> {
        input.validate()?;
        let request = ApiRequest::post("user/shippingAddress/new").json(input)?;
        self.apply_address_change(&request).await
    }

    /// Edit an existing address.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidInput` before any network call if the form is
    /// invalid, or the request error.
    #[instrument(skip(self, input), fields(address_id = %id))]
    pub async fn update_address(&self, id: &AddressId, input: &AddressInput) -> Result<Option<String>> {
        input.validate()?;
        let request = ApiRequest::put(format!(
            "user/shippingAddress/update/{}",
            urlencoding::encode(id.as_str())
        ))
        .json(input)?;
        self.apply_address_change(&request).await
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn delete_address(&self, id: &AddressId) -> Result<Option<String>> {
        let request = ApiRequest::delete(format!(
            "user/shippingAddress/delete/{}",
            urlencoding::encode(id.as_str())
        ));
        self.apply_address_change(&request).await
    }

    async fn apply_address_change(&self, request: &ApiRequest) -> Result<Option<String>> {
        let response = self.authorized.execute(request).await?;
        let message = response.message.clone();
        let data: AddressResponse = response.decode()?;
        info!(count = data.user.shipping_addresses.len(), "Address book updated");
        self.store.set_shipping_addresses(data.user.shipping_addresses);
        Ok(message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    fn valid() -> AddressInput {
        AddressInput {
            name: "Asha".to_string(),
            phone: "9876543210".to_string(),
            pincode: "560001".to_string(),
            locality: "Indiranagar".to_string(),
            address: "1 CMH Road".to_string(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            address_type: AddressType::Home,
            alternate_phone: None,
        }
    }

    #[test]
    fn test_valid_address() {
        assert!(valid().validate().is_ok());
        let with_blank_alt = AddressInput {
            alternate_phone: Some(String::new()),
            ..valid()
        };
        assert!(with_blank_alt.validate().is_ok());
    }

    #[test]
    fn test_invalid_fields_are_named() {
        let err = AddressInput {
            pincode: "56OOO1".to_string(),
            ..valid()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(ref m) if m.starts_with("Pincode")));

        let err = AddressInput {
            city: " ".to_string(),
            ..valid()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(ref m) if m.starts_with("City")));
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(valid()).unwrap_or_default();
        assert_eq!(json["addressType"], "home");
        assert!(json.get("alternatePhone").is_none());
    }
}
