//! Money in integer minor units, plus the tax policy applied to it.
//!
//! All cart arithmetic happens on whole cents. Fractional intermediate values
//! (tax, percentage discounts) are computed in [`Decimal`] and rounded back to
//! cents with an explicit [`Rounding`] strategy.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An amount of money in minor currency units (cents).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero cents.
    pub const ZERO: Self = Self(0);

    /// Create an amount from cents.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Create an amount from whole currency units (dollars).
    #[must_use]
    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars.saturating_mul(100))
    }

    /// Get the amount in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Multiply a unit price by a quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(i64::from(quantity)))
    }

    /// Multiply by a decimal factor and round back to whole cents.
    #[must_use]
    pub fn scale(self, factor: Decimal, rounding: Rounding) -> Self {
        Decimal::from(self.0)
            .checked_mul(factor)
            .map(|product| product.round_dp_with_strategy(0, rounding.strategy()))
            .and_then(|rounded| rounded.to_i64())
            .map_or(Self(i64::MAX), Self)
    }

    /// The amount as a decimal number of whole units (e.g. `12.34`).
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Format for display with a currency symbol (e.g. `$12.34`).
    #[must_use]
    pub fn display(self, currency: CurrencyCode) -> String {
        format!("{}{:.2}", currency.symbol(), self.to_decimal())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_decimal())
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    CAD,
    USD,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::CAD | Self::USD => "$",
        }
    }

    /// Three-letter ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::CAD => "CAD",
            Self::USD => "USD",
        }
    }
}

/// How fractional cents are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Ties round away from zero (`0.5` → `1`).
    #[default]
    HalfUp,
    /// Ties round to the even neighbour (`0.5` → `0`, `1.5` → `2`).
    HalfEven,
}

impl Rounding {
    const fn strategy(self) -> RoundingStrategy {
        match self {
            Self::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            Self::HalfEven => RoundingStrategy::MidpointNearestEven,
        }
    }
}

impl FromStr for Rounding {
    type Err = TaxRateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "half_up" | "half-up" => Ok(Self::HalfUp),
            "half_even" | "half-even" | "bankers" => Ok(Self::HalfEven),
            other => Err(TaxRateError::UnknownRounding(other.to_owned())),
        }
    }
}

/// Errors from parsing tax configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaxRateError {
    #[error("tax rate is not a decimal number: {0}")]
    NotANumber(String),

    #[error("tax rate must be between 0 and 1, got {0}")]
    OutOfRange(Decimal),

    #[error("unknown rounding strategy: {0}")]
    UnknownRounding(String),
}

/// A sales tax rate expressed as a fraction (`0.13` for 13 %).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// Ontario HST.
    pub const ONTARIO_HST: Self = Self(Decimal::from_parts(13, 0, 0, false, 2));

    /// Create a rate from a fraction in `0..=1`.
    ///
    /// # Errors
    ///
    /// Returns `TaxRateError::OutOfRange` for negative rates or rates above 1.
    pub fn new(rate: Decimal) -> Result<Self, TaxRateError> {
        if rate.is_sign_negative() || rate > Decimal::ONE {
            return Err(TaxRateError::OutOfRange(rate));
        }
        Ok(Self(rate))
    }

    /// The rate as a fraction.
    #[must_use]
    pub const fn as_decimal(self) -> Decimal {
        self.0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        Self::ONTARIO_HST
    }
}

impl FromStr for TaxRate {
    type Err = TaxRateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rate =
            Decimal::from_str(s.trim()).map_err(|_| TaxRateError::NotANumber(s.to_owned()))?;
        Self::new(rate)
    }
}

/// Regional tax rate plus the rounding applied to the computed tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxPolicy {
    pub rate: TaxRate,
    pub rounding: Rounding,
}

impl TaxPolicy {
    /// Create a tax policy.
    #[must_use]
    pub const fn new(rate: TaxRate, rounding: Rounding) -> Self {
        Self { rate, rounding }
    }

    /// Tax owed on a taxable amount, rounded to whole cents.
    #[must_use]
    pub fn tax_on(&self, taxable: Money) -> Money {
        taxable.scale(self.rate.as_decimal(), self.rounding)
    }
}
