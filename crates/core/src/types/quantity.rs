//! Cart line quantity.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing or stepping a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// The quantity would drop below one.
    #[error("quantity cannot be less than {min}")]
    BelowMinimum {
        /// Smallest allowed quantity.
        min: u32,
    },
    /// The quantity would exceed the per-line ceiling.
    #[error("quantity cannot be more than {max}")]
    AboveMaximum {
        /// Largest allowed quantity.
        max: u32,
    },
}

/// Number of units of one product in the cart.
///
/// Always within `1..=6`. The ceiling is a storefront rule, not a stock
/// check; the backend still decides whether the units are available.
///
/// ```
/// use emporium_core::{Quantity, QuantityError};
///
/// let q = Quantity::new(6).unwrap();
/// assert_eq!(q.increment(), Err(QuantityError::AboveMaximum { max: 6 }));
/// assert_eq!(q.decrement().unwrap().get(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Smallest quantity a cart line can hold.
    pub const MIN: u32 = 1;
    /// Largest quantity a cart line can hold.
    pub const MAX: u32 = 6;
    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is outside `1..=6`.
    pub const fn new(value: u32) -> Result<Self, QuantityError> {
        if value < Self::MIN {
            Err(QuantityError::BelowMinimum { min: Self::MIN })
        } else if value > Self::MAX {
            Err(QuantityError::AboveMaximum { max: Self::MAX })
        } else {
            Ok(Self(value))
        }
    }

    /// The raw unit count.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Apply a signed step.
    ///
    /// # Errors
    ///
    /// Returns an error if the result would leave `1..=6`.
    pub fn step(self, delta: i32) -> Result<Self, QuantityError> {
        let next = i64::from(self.0) + i64::from(delta);
        if next < i64::from(Self::MIN) {
            return Err(QuantityError::BelowMinimum { min: Self::MIN });
        }
        u32::try_from(next)
            .map_err(|_| QuantityError::AboveMaximum { max: Self::MAX })
            .and_then(Self::new)
    }

    /// One more unit.
    ///
    /// # Errors
    ///
    /// Returns an error at the ceiling.
    pub fn increment(self) -> Result<Self, QuantityError> {
        self.step(1)
    }

    /// One less unit.
    ///
    /// # Errors
    ///
    /// Returns an error at one unit.
    pub fn decrement(self) -> Result<Self, QuantityError> {
        self.step(-1)
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(Quantity::new(0).is_err());
        assert!(Quantity::new(1).is_ok());
        assert!(Quantity::new(6).is_ok());
        assert_eq!(
            Quantity::new(7),
            Err(QuantityError::AboveMaximum { max: 6 })
        );
    }

    #[test]
    fn test_step() {
        let q = Quantity::new(3).unwrap();
        assert_eq!(q.step(3).unwrap().get(), 6);
        assert!(q.step(4).is_err());
        assert_eq!(
            q.step(-3),
            Err(QuantityError::BelowMinimum { min: 1 })
        );
        assert_eq!(Quantity::ONE.decrement(), Err(QuantityError::BelowMinimum { min: 1 }));
    }

    #[test]
    fn test_deserialize_rejects_out_of_range() {
        assert_eq!(serde_json::from_str::<Quantity>("2").unwrap().get(), 2);
        assert!(serde_json::from_str::<Quantity>("9").is_err());
        assert_eq!(serde_json::to_string(&Quantity::ONE).unwrap(), "1");
    }
}
