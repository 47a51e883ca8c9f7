//! Stock count type.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Quantity;

/// Number of units available for a row.
///
/// Stored stock values are edited by hand in the CMS and may be missing,
/// `null`, or not a number at all. All of those read as zero so that they can
/// never satisfy a reservation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Stock(u64);

impl Stock {
    /// An empty row.
    pub const ZERO: Self = Self(0);

    /// Create a stock count.
    #[must_use]
    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    /// Interpret a raw stored value.
    ///
    /// - non-negative integers are taken as-is
    /// - non-negative finite decimals are floored
    /// - anything else (absent, `null`, strings, negative numbers) is zero
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_stored(value: Option<&Value>) -> Self {
        let Some(Value::Number(n)) = value else {
            return Self::ZERO;
        };
        if let Some(units) = n.as_u64() {
            return Self(units);
        }
        match n.as_f64() {
            // Saturating float-to-int cast; the value is finite and non-negative.
            Some(f) if f.is_finite() && f > 0.0 => Self(f.floor() as u64),
            _ => Self::ZERO,
        }
    }

    /// Returns the raw unit count.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether `quantity` units can be taken out of this stock.
    #[must_use]
    pub const fn covers(self, quantity: Quantity) -> bool {
        quantity.get() as u64 <= self.0
    }

    /// Stock left after taking `quantity` units, or `None` if there is not
    /// enough.
    #[must_use]
    pub const fn checked_take(self, quantity: Quantity) -> Option<Self> {
        match self.0.checked_sub(quantity.get() as u64) {
            Some(left) => Some(Self(left)),
            None => None,
        }
    }
}

impl fmt::Display for Stock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Stock {
    fn from(units: u64) -> Self {
        Self(units)
    }
}

impl From<Stock> for u64 {
    fn from(stock: Stock) -> Self {
        stock.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_stored_integer() {
        assert_eq!(Stock::from_stored(Some(&json!(10))), Stock::new(10));
        assert_eq!(Stock::from_stored(Some(&json!(0))), Stock::ZERO);
    }

    #[test]
    fn test_from_stored_missing_or_junk_is_zero() {
        assert_eq!(Stock::from_stored(None), Stock::ZERO);
        assert_eq!(Stock::from_stored(Some(&Value::Null)), Stock::ZERO);
        assert_eq!(Stock::from_stored(Some(&json!("12"))), Stock::ZERO);
        assert_eq!(Stock::from_stored(Some(&json!({"n": 1}))), Stock::ZERO);
        assert_eq!(Stock::from_stored(Some(&json!(-5))), Stock::ZERO);
        assert_eq!(Stock::from_stored(Some(&json!(-0.5))), Stock::ZERO);
    }

    #[test]
    fn test_from_stored_decimal_is_floored() {
        assert_eq!(Stock::from_stored(Some(&json!(3.9))), Stock::new(3));
    }

    #[test]
    fn test_covers_and_take() {
        let stock = Stock::new(10);
        let four = Quantity::new(4).unwrap();
        let eleven = Quantity::new(11).unwrap();

        assert!(stock.covers(four));
        assert!(!stock.covers(eleven));
        assert_eq!(stock.checked_take(four), Some(Stock::new(6)));
        assert_eq!(stock.checked_take(eleven), None);
        assert_eq!(
            Stock::new(4).checked_take(four),
            Some(Stock::ZERO),
            "taking everything leaves zero"
        );
    }
}
