//! Fixed-point money amounts.
//!
//! Amounts are stored as integer minor units plus a currency tag, so sums never
//! drift. Decimal parsing and formatting go through rust_decimal.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::error::ValidationError;
use super::primitives::Currency;

/// Signed amount of money in a single currency.
///
/// Comparisons between different currencies are undefined (`partial_cmp`
/// returns `None`), and arithmetic across currencies fails with
/// [`ValidationError::CurrencyMismatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor: i64,
    currency: Currency,
}

impl Money {
    /// Create an amount from integer minor units (cents for EUR).
    pub const fn new(minor: i64, currency: Currency) -> Self {
        Money { minor, currency }
    }

    pub const fn zero(currency: Currency) -> Self {
        Money { minor: 0, currency }
    }

    /// Raw value in minor units.
    pub fn minor(&self) -> i64 {
        self.minor
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Convert a major-unit decimal (e.g. `12.5`) into minor units.
    ///
    /// # Errors
    /// Fails if the value carries more fractional digits than the currency
    /// allows, or does not fit in an `i64` of minor units.
    pub fn from_decimal(value: Decimal, currency: Currency) -> Result<Self, ValidationError> {
        let scale = Decimal::from(10i64.pow(currency.minor_units()));
        let scaled = value
            .checked_mul(scale)
            .ok_or(ValidationError::AmountOverflow)?;
        if !scaled.fract().is_zero() {
            return Err(ValidationError::InvalidAmount(format!(
                "{} has more than {} decimal places for {}",
                value,
                currency.minor_units(),
                currency
            )));
        }
        let minor = scaled.to_i64().ok_or(ValidationError::AmountOverflow)?;
        Ok(Money::new(minor, currency))
    }

    /// Parse a major-unit decimal string losslessly.
    pub fn parse(input: &str, currency: Currency) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let value: Decimal = trimmed
            .parse()
            .map_err(|_| ValidationError::InvalidAmount(trimmed.to_string()))?;
        Money::from_decimal(value, currency)
    }

    /// Major-unit decimal value, e.g. `12.34`.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.minor, self.currency.minor_units())
    }

    /// Major-unit string with exactly the currency's decimal places, no code.
    pub fn to_canonical_string(&self) -> String {
        self.to_decimal().to_string()
    }

    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    pub fn is_positive(&self) -> bool {
        self.minor > 0
    }

    pub fn is_negative(&self) -> bool {
        self.minor < 0
    }

    pub fn abs(&self) -> Self {
        Money::new(self.minor.abs(), self.currency)
    }

    pub fn ensure_currency(&self, expected: Currency) -> Result<(), ValidationError> {
        if self.currency != expected {
            return Err(ValidationError::CurrencyMismatch {
                expected,
                actual: self.currency,
            });
        }
        Ok(())
    }

    pub fn checked_add(self, rhs: Money) -> Result<Money, ValidationError> {
        rhs.ensure_currency(self.currency)?;
        self.minor
            .checked_add(rhs.minor)
            .map(|minor| Money::new(minor, self.currency))
            .ok_or(ValidationError::AmountOverflow)
    }

    pub fn checked_sub(self, rhs: Money) -> Result<Money, ValidationError> {
        rhs.ensure_currency(self.currency)?;
        self.minor
            .checked_sub(rhs.minor)
            .map(|minor| Money::new(minor, self.currency))
            .ok_or(ValidationError::AmountOverflow)
    }

    pub fn mul_scalar(self, factor: i64) -> Result<Money, ValidationError> {
        self.minor
            .checked_mul(factor)
            .map(|minor| Money::new(minor, self.currency))
            .ok_or(ValidationError::AmountOverflow)
    }

    /// Multiply by a decimal factor, truncating toward zero to a whole minor unit.
    pub fn mul_decimal(self, factor: Decimal) -> Result<Money, ValidationError> {
        let product = Decimal::from(self.minor)
            .checked_mul(factor)
            .ok_or(ValidationError::AmountOverflow)?;
        let minor = product
            .trunc()
            .to_i64()
            .ok_or(ValidationError::AmountOverflow)?;
        Ok(Money::new(minor, self.currency))
    }

    /// Sum amounts that must all be in `currency`.
    pub fn sum<'a, I>(amounts: I, currency: Currency) -> Result<Money, ValidationError>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(*m))
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency != other.currency {
            return None;
        }
        Some(self.minor.cmp(&other.minor))
    }
}

impl std::ops::Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money::new(-self.minor, self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_canonical_string(), self.currency)
    }
}
