//! Exact money arithmetic for cost estimates.
//!
//! Amounts are stored as integer micro-units (one millionth of the currency
//! unit) so estimates stay exact and deterministic.

use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::CostError;

const MICROS_PER_UNIT: u64 = 1_000_000;
const MICROS_PER_CENT: u64 = 10_000;
const CENTS_PER_UNIT: u64 = 100;
const FRACTION_DIGITS: usize = 6;

/// Estimated monthly cost of a resource, in micro-units of currency.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MonthlyCost(u64);

impl MonthlyCost {
    /// A zero cost.
    pub const ZERO: Self = Self(0);

    /// Creates a cost from micro-units.
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Returns the cost in micro-units.
    #[must_use]
    pub const fn micros(self) -> u64 {
        self.0
    }

    /// Adds two costs, saturating at the maximum representable amount.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Returns the amount rounded half-up to whole cents.
    #[must_use]
    pub const fn cents(self) -> u64 {
        self.0
            .saturating_add(MICROS_PER_CENT.div_euclid(2))
            .div_euclid(MICROS_PER_CENT)
    }

    fn decimal_string(self) -> String {
        format!(
            "{}.{:0width$}",
            self.0.div_euclid(MICROS_PER_UNIT),
            self.0.rem_euclid(MICROS_PER_UNIT),
            width = FRACTION_DIGITS
        )
    }
}

impl fmt::Display for MonthlyCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cents = self.cents();
        write!(
            f,
            "${}.{:02}",
            cents.div_euclid(CENTS_PER_UNIT),
            cents.rem_euclid(CENTS_PER_UNIT)
        )
    }
}

impl Sum for MonthlyCost {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

impl Serialize for MonthlyCost {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let number = serde_json::Number::from_str(&self.decimal_string())
            .map_err(serde::ser::Error::custom)?;
        number.serialize(serializer)
    }
}

/// Price of one GiB of storage for one month, in micro-units of currency.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RatePerGib(u64);

impl RatePerGib {
    /// Creates a rate from micro-units per GiB-month.
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Returns the rate in micro-units per GiB-month.
    #[must_use]
    pub const fn micros(self) -> u64 {
        self.0
    }

    /// Monthly cost of `size_gib` GiB at this rate.
    #[must_use]
    pub const fn monthly_cost(self, size_gib: u64) -> MonthlyCost {
        MonthlyCost(self.0.saturating_mul(size_gib))
    }
}

impl FromStr for RatePerGib {
    type Err = CostError;

    /// Parses a decimal rate such as `0.08`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_micros(raw).map(Self)
    }
}

impl fmt::Display for RatePerGib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/GiB", MonthlyCost(self.0))
    }
}

fn parse_micros(raw: &str) -> Result<u64, CostError> {
    let value = raw.trim();
    let invalid = |reason: &str| CostError::InvalidRate {
        value: value.to_owned(),
        reason: reason.to_owned(),
    };

    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("rate must not be empty"));
    }
    if !whole.chars().chain(fraction.chars()).all(|ch| ch.is_ascii_digit()) {
        return Err(invalid("rate must be a non-negative decimal number"));
    }
    if fraction.len() > FRACTION_DIGITS {
        return Err(invalid("rate supports at most six decimal places"));
    }

    let whole_units = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .map_err(|_| invalid("rate is too large"))?
    };
    let padded = format!("{fraction:0<width$}", width = FRACTION_DIGITS);
    let fraction_micros = padded
        .parse::<u64>()
        .map_err(|_| invalid("rate fraction is not a number"))?;

    whole_units
        .checked_mul(MICROS_PER_UNIT)
        .and_then(|micros| micros.checked_add(fraction_micros))
        .ok_or_else(|| invalid("rate is too large"))
}
