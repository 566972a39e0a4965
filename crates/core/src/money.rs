//! Currency amounts and percentages as exact integers.
//!
//! Amounts are minor units (cents); percentages are hundredths of a percent.
//! Nothing in the pricing path touches floating point.

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// Non-negative currency amount in the smallest unit (cents).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Whole currency units (e.g. `from_units(50)` is 50.00).
    pub const fn from_units(units: u64) -> Self {
        Self(units * 100)
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Unit price times quantity. `None` on overflow.
    pub fn checked_times(self, quantity: u64) -> Option<Money> {
        self.0.checked_mul(quantity).map(Money)
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Subtraction floored at zero.
    pub fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }
}

impl core::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Percentage with two decimal places, stored as hundredths of a percent.
///
/// `Percentage::from_hundredths(1250)` is 12.5%. Values above 100% are
/// representable; callers that apply them floor the result at zero.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(u32);

impl ValueObject for Percentage {}

impl Percentage {
    pub const fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    pub const fn from_whole(percent: u32) -> Self {
        Self(percent * 100)
    }

    pub const fn hundredths(self) -> u32 {
        self.0
    }

    /// This percentage of `amount`, rounded half-up to the cent.
    pub fn of(self, amount: Money) -> Money {
        let scaled = amount.cents() as u128 * self.0 as u128;
        let rounded = (scaled + 5_000) / 10_000;
        Money(u64::try_from(rounded).unwrap_or(u64::MAX))
    }
}

impl core::fmt::Display for Percentage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{}%", self.0 / 100)
        } else {
            write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_always_has_two_decimals() {
        assert_eq!(Money::from_cents(16_659).to_string(), "166.59");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_units(200).to_string(), "200.00");
    }

    #[test]
    fn saturating_sub_floors_at_zero() {
        let m = Money::from_units(10);
        assert_eq!(m.saturating_sub(Money::from_units(25)), Money::ZERO);
        assert_eq!(m.saturating_sub(Money::from_cents(1)), Money::from_cents(999));
    }

    #[test]
    fn percentage_of_rounds_half_up() {
        // 10% of 150.00
        assert_eq!(Percentage::from_whole(10).of(Money::from_units(150)), Money::from_units(15));
        // 12.5% of 0.99 = 0.12375 -> 0.12
        assert_eq!(Percentage::from_hundredths(1250).of(Money::from_cents(99)), Money::from_cents(12));
        // 50% of 0.01 = 0.005 -> 0.01
        assert_eq!(Percentage::from_whole(50).of(Money::from_cents(1)), Money::from_cents(1));
    }

    #[test]
    fn percentage_display() {
        assert_eq!(Percentage::from_whole(10).to_string(), "10%");
        assert_eq!(Percentage::from_hundredths(1250).to_string(), "12.50%");
    }

    proptest! {
        /// Property: a percentage of an amount never exceeds the amount when the
        /// percentage is at most 100%.
        #[test]
        fn percentage_up_to_hundred_never_exceeds_amount(
            cents in 0u64..10_000_000_000u64,
            hundredths in 0u32..=10_000u32,
        ) {
            let amount = Money::from_cents(cents);
            prop_assert!(Percentage::from_hundredths(hundredths).of(amount) <= amount);
        }
    }
}
