use regex::Regex;
use serde_with::{DeserializeFromStr, SerializeDisplay};

use std::{
    fmt::{Debug, Display},
    str::FromStr,
    sync::LazyLock,
};

use crate::{Error, Result};

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-)?(\d+)(?:\.(\d{1,2}))?$").expect("amount pattern is valid")
});

/// Represents an amount of money.
///
/// The amount is stored internally as an integer number of cents, so sums and
/// differences are exact. The [`Display`] implementation formats it as a
/// decimal number to 2 places, which is also the form written to CSV files.
///
/// No currency is attached: a price of `2.50` means two and a half units of
/// whatever currency the shop trades in.
///
/// Arithmetic is checked. A result that does not fit is
/// [`Error::Overflow`], never a wrapped or panicking value.
#[derive(
    Clone,
    Copy,
    Default,
    DeserializeFromStr,
    SerializeDisplay,
    Eq,
    Hash,
    PartialEq,
    Ord,
    PartialOrd,
)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// The largest amount, either way from zero, accepted when parsing:
    /// one billion less a cent.
    pub const LIMIT: Money = Money(99_999_999_999);

    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if the sum does not fit.
    pub fn try_add(self, rhs: Self) -> Result<Self> {
        self.0.checked_add(rhs.0).map(Self).ok_or(Error::Overflow)
    }

    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if the difference does not fit.
    pub fn try_sub(self, rhs: Self) -> Result<Self> {
        self.0.checked_sub(rhs.0).map(Self).ok_or(Error::Overflow)
    }

    /// Multiplies by a quantity of units.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if the product does not fit.
    pub fn try_mul(self, quantity: u32) -> Result<Self> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Self)
            .ok_or(Error::Overflow)
    }

    /// Adds up `amounts`, failing on the first sum that does not fit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overflow`] if the total does not fit.
    pub fn try_sum<I: IntoIterator<Item = Self>>(amounts: I) -> Result<Self> {
        amounts.into_iter().try_fold(Self::ZERO, Self::try_add)
    }
}

impl Debug for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        let amount = format!("{sign}{}.{:02}", cents / 100, cents % 100);
        f.pad(&amount)
    }
}

impl FromStr for Money {
    type Err = Error;

    /// Parses amounts such as `2`, `2.5`, `2.50`, `-1.25` or `3,409.15`.
    ///
    /// Commas are treated as thousands separators and ignored. More than two
    /// decimal places is an error, since the amount could not be stored
    /// exactly, and so is an amount beyond [`Money::LIMIT`].
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let cleaned = s.trim().replace(',', "");
        let invalid = || Error::InvalidAmount(s.to_string());
        let caps = AMOUNT.captures(&cleaned).ok_or_else(invalid)?;
        let units: i64 = caps[2].parse().map_err(|_| invalid())?;
        let fraction = match caps.get(3) {
            Some(m) if m.as_str().len() == 1 => {
                m.as_str().parse::<i64>().map_err(|_| invalid())? * 10
            }
            Some(m) => m.as_str().parse::<i64>().map_err(|_| invalid())?,
            None => 0,
        };
        let cents = units
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .filter(|&c| c <= Self::LIMIT.0)
            .ok_or_else(invalid)?;
        Ok(Self(if caps.get(1).is_some() { -cents } else { cents }))
    }
}
