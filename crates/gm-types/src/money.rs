//! Fixed-point, scale-2 monetary amounts.
//!
//! Amounts flow through the system as [`rust_decimal::Decimal`] end to end —
//! domain model, JSON wire format, and SQL `NUMERIC(10,2)` binding — so that
//! summation and comparison never drift the way binary floating point would.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// A non-negative-by-convention amount of loyalty points, scale 2.
///
/// `Money` does not itself forbid negative values (a balance *difference* can
/// legitimately be computed as negative internally before the
/// [`crate::error::LedgerError::InsufficientFunds`] check fires); callers
/// enforce non-negativity where the spec requires it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// The additive identity.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Builds a `Money` value, rounding to two fractional digits (banker's
    /// rounding, matching `rust_decimal`'s default).
    pub fn new(value: Decimal) -> Self {
        Money(value.round_dp(2))
    }

    /// The underlying decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// `true` when the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Self) -> Self::Output {
        Money::new(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Self) -> Self::Output {
        Money::new(self.0 - rhs.0)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.round_dp(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_to_two_fractional_digits() {
        let m = Money::new(dec!(42.505));
        assert_eq!(m.as_decimal(), dec!(42.50));
    }

    #[test]
    fn json_round_trip_preserves_two_fractional_digits() {
        let m = Money::new(dec!(42.50));
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "42.50");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn subtraction_can_go_negative_for_internal_checks() {
        let a = Money::new(dec!(10.00));
        let b = Money::new(dec!(15.00));
        assert!((a - b).as_decimal() < Decimal::ZERO);
    }
}
