//! Fixed-point money.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places kept for every amount.
pub const SCALE: u32 = 2;

/// Minor units (kobo, cents) per major unit.
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// A currency amount in major units with two decimal places.
///
/// Amounts are stored and persisted in major units (e.g. `1500.00`); the
/// payment gateway receives minor units via [`Money::to_minor_units`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

fn normalize(amount: Decimal) -> Decimal {
    let mut value = amount.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
    value.rescale(SCALE);
    value
}

impl Money {
    /// Creates an amount from a decimal value, rounding to two places.
    pub fn new(amount: Decimal) -> Self {
        Self(normalize(amount))
    }

    /// Creates an amount from a whole number of major units.
    pub fn from_major(units: i64) -> Self {
        Self::new(Decimal::from(units))
    }

    /// Creates an amount from minor units (e.g. `150050` kobo = `1500.50`).
    pub fn from_minor(minor: i64) -> Self {
        Self::new(Decimal::new(minor, SCALE))
    }

    /// Returns zero.
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }

    /// Returns the decimal amount in major units.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Converts to the gateway's minor-unit convention.
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    pub fn to_minor_units(&self) -> Option<i64> {
        self.0
            .checked_mul(Decimal::from(MINOR_UNITS_PER_MAJOR))?
            .round()
            .to_i64()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money::new(self.0 * Decimal::from(quantity))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", normalize(self.0))
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money::new(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money::new(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}
