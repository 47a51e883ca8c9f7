//! Requested quantity type.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors that can occur when parsing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The value was absent or `null`.
    #[error("quantity is required")]
    Missing,
    /// The value is neither a number nor a numeric string.
    #[error("quantity must be a number")]
    NotANumber,
    /// The value is zero or negative.
    #[error("quantity must be greater than zero")]
    NotPositive,
    /// The value has a fractional part.
    #[error("quantity must be a whole number")]
    NotWhole,
    /// The value does not fit the supported range.
    #[error("quantity must be at most {max}")]
    TooLarge {
        /// Maximum allowed quantity.
        max: u32,
    },
}

/// A strictly positive number of units to take out of stock.
///
/// A `Quantity` can only be built through validation, so holding one means
/// the "quantity must be a positive integer" rule has already been checked
/// and no store call is needed to reject bad input.
///
/// ## Examples
///
/// ```
/// use pexpress_core::Quantity;
/// use serde_json::json;
///
/// assert_eq!(Quantity::from_json(&json!(4)).map(Quantity::get), Ok(4));
/// assert_eq!(Quantity::from_json(&json!("2")).map(Quantity::get), Ok(2));
///
/// assert!(Quantity::from_json(&json!(0)).is_err());
/// assert!(Quantity::from_json(&json!(-3)).is_err());
/// assert!(Quantity::from_json(&json!(1.5)).is_err());
/// assert!(Quantity::from_json(&json!("abc")).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// Largest quantity accepted in a single request.
    pub const MAX: u32 = u32::MAX;

    /// Create a quantity from an integer.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::NotPositive`] for zero.
    pub const fn new(value: u32) -> Result<Self, QuantityError> {
        match NonZeroU32::new(value) {
            Some(v) => Ok(Self(v)),
            None => Err(QuantityError::NotPositive),
        }
    }

    /// Parse a quantity from an untyped JSON value.
    ///
    /// Accepts JSON numbers and numeric strings whose value is a positive
    /// whole number (`3`, `3.0` and `"3"` are all the same quantity).
    ///
    /// # Errors
    ///
    /// Returns a [`QuantityError`] describing why the value was rejected.
    pub fn from_json(value: &Value) -> Result<Self, QuantityError> {
        match value {
            Value::Null => Err(QuantityError::Missing),
            Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    return Self::from_u64(v);
                }
                if n.as_i64().is_some() {
                    return Err(QuantityError::NotPositive);
                }
                n.as_f64()
                    .map_or(Err(QuantityError::NotANumber), Self::from_f64)
            }
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(QuantityError::NotANumber);
                }
                trimmed
                    .parse::<f64>()
                    .map_err(|_| QuantityError::NotANumber)
                    .and_then(Self::from_f64)
            }
            _ => Err(QuantityError::NotANumber),
        }
    }

    fn from_u64(value: u64) -> Result<Self, QuantityError> {
        let value =
            u32::try_from(value).map_err(|_| QuantityError::TooLarge { max: Self::MAX })?;
        Self::new(value)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_f64(value: f64) -> Result<Self, QuantityError> {
        if !value.is_finite() {
            return Err(QuantityError::NotANumber);
        }
        if value <= 0.0 {
            return Err(QuantityError::NotPositive);
        }
        if value.fract() != 0.0 {
            return Err(QuantityError::NotWhole);
        }
        if value > f64::from(Self::MAX) {
            return Err(QuantityError::TooLarge { max: Self::MAX });
        }
        // Range and integrality checked above.
        Self::new(value as u32)
    }

    /// Returns the quantity as a plain integer.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Add two quantities, failing if the sum leaves the supported range.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::TooLarge`] on overflow.
    pub fn checked_add(self, other: Self) -> Result<Self, QuantityError> {
        self.0
            .checked_add(other.get())
            .map(Self)
            .ok_or(QuantityError::TooLarge { max: Self::MAX })
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_json(&Value::String(s.to_owned()))
    }
}
