//! Betting-unit arithmetic for stake allocation.
//!
//! Stakes are held as integer hundredths of a unit so that splitting a
//! bankroll across many round-robin tickets never drifts.
//!
//! ```rust
//! use picks_rust_core::utils::units::Units;
//!
//! let per_ticket = Units::from_units(10.0).split_floor(3, Units::STAKE_STEP);
//! assert_eq!(per_ticket.hundredths(), 330);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// Stake value stored as hundredths of a betting unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Units {
    hundredths: i64,
}

impl Units {
    /// Smallest stake increment a ticket may carry (0.05u)
    pub const STAKE_STEP: Units = Units::from_hundredths(5);

    #[inline]
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self { hundredths }
    }

    /// Create from a fractional unit amount (rounds to nearest hundredth)
    #[inline]
    pub fn from_units(units: f64) -> Self {
        Self {
            hundredths: (units * 100.0).round() as i64,
        }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { hundredths: 0 }
    }

    #[inline]
    pub const fn hundredths(&self) -> i64 {
        self.hundredths
    }

    #[inline]
    pub fn as_units(&self) -> f64 {
        self.hundredths as f64 / 100.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.hundredths == 0
    }

    /// Divide into `parts` equal stakes, rounded down to a multiple of `step`.
    pub fn split_floor(self, parts: usize, step: Units) -> Units {
        if parts == 0 || step.hundredths <= 0 {
            return Units::zero();
        }
        let raw = self.hundredths / parts as i64;
        Units::from_hundredths(raw - raw.rem_euclid(step.hundredths))
    }

    /// Scale by a decimal multiplier (payouts), rounding to nearest hundredth
    pub fn scale(self, factor: f64) -> Units {
        Units::from_hundredths((self.hundredths as f64 * factor).round() as i64)
    }
}

impl Add for Units {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            hundredths: self.hundredths + other.hundredths,
        }
    }
}

impl Sub for Units {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            hundredths: self.hundredths - other.hundredths,
        }
    }
}

impl Mul<i64> for Units {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: i64) -> Self {
        Self {
            hundredths: self.hundredths * rhs,
        }
    }
}

impl std::iter::Sum for Units {
    fn sum<I: Iterator<Item = Units>>(iter: I) -> Self {
        iter.fold(Units::zero(), |acc, u| acc + u)
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}u", self.as_units())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_units_rounding() {
        assert_eq!(Units::from_units(1.234).hundredths(), 123);
        assert_eq!(Units::from_units(0.05).hundredths(), 5);
        assert_eq!(Units::from_units(-2.5).hundredths(), -250);
    }

    #[test]
    fn test_split_floor_to_step() {
        let total = Units::from_units(10.0);
        assert_eq!(total.split_floor(3, Units::STAKE_STEP).hundredths(), 330);
        assert_eq!(total.split_floor(6, Units::STAKE_STEP).hundredths(), 165);
        assert_eq!(total.split_floor(7, Units::STAKE_STEP).hundredths(), 140);
        assert!(Units::from_units(0.1).split_floor(3, Units::STAKE_STEP).is_zero());
        assert!(total.split_floor(0, Units::STAKE_STEP).is_zero());
    }

    #[test]
    fn test_sum_has_no_drift() {
        let total: Units = (0..1000).map(|_| Units::from_hundredths(1)).sum();
        assert_eq!(total.as_units(), 10.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Units::from_hundredths(165).to_string(), "1.65u");
        assert_eq!(Units::from_units(3.0).scale(2.5).to_string(), "7.50u");
    }
}
