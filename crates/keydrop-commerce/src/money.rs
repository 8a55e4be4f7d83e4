//! Money type for representing monetary values.
//!
//! Amounts are integers in the smallest unit of the shop currency, so prices,
//! discounts and revenue never pass through floating point.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Display currency of the shop.
///
/// The storefront sells in a single currency; this only controls how amounts
/// are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    IDR,
    USD,
    EUR,
    GBP,
    JPY,
}

impl Currency {
    /// Get the currency code (e.g., "IDR").
    pub fn code(&self) -> &'static str {
        match self {
            Currency::IDR => "IDR",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
        }
    }

    /// Get the currency symbol (e.g., "Rp").
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::IDR => "Rp",
            Currency::USD => "$",
            Currency::EUR => "\u{20ac}",
            Currency::GBP => "\u{00a3}",
            Currency::JPY => "\u{00a5}",
        }
    }

    /// Number of decimal places in the minor unit.
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::IDR | Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Parse a currency code string.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_uppercase().as_str() {
            "IDR" => Some(Currency::IDR),
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            "JPY" => Some(Currency::JPY),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A monetary amount in minor units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Create a Money value from minor units.
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Zero.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Amount in minor units.
    pub fn amount(&self) -> i64 {
        self.0
    }

    /// Check if this is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Check if this is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Add, returning `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Subtract, returning `None` on overflow.
    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Multiply by a quantity, returning `None` on overflow.
    pub fn checked_mul(&self, factor: i64) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }

    /// Subtract, flooring at zero.
    pub fn saturating_sub_floor(&self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0).max(0))
    }

    /// `percent`% of this amount, rounded half away from zero.
    ///
    /// ```
    /// use keydrop_commerce::money::Money;
    /// assert_eq!(Money::new(100_000).percentage(10), Money::new(10_000));
    /// assert_eq!(Money::new(999).percentage(50), Money::new(500));
    /// ```
    pub fn percentage(&self, percent: i64) -> Money {
        let scaled = i128::from(self.0) * i128::from(percent);
        let rounded = if scaled >= 0 {
            (scaled + 50) / 100
        } else {
            (scaled - 50) / 100
        };
        Money(rounded.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
    }

    /// Sum amounts, returning `None` on overflow.
    pub fn try_sum(iter: impl IntoIterator<Item = Money>) -> Option<Money> {
        iter.into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Format with a currency symbol (e.g., "Rp100000" or "$49.99").
    pub fn display(&self, currency: Currency) -> String {
        let places = currency.decimal_places();
        if places == 0 {
            return format!("{}{}", currency.symbol(), self.0);
        }
        let divisor = 10_i64.pow(places);
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!(
            "{}{}{}.{:0width$}",
            sign,
            currency.symbol(),
            abs / divisor as u64,
            abs % divisor as u64,
            width = places as usize
        )
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Money> for keydrop_db::Value {
    fn from(m: Money) -> Self {
        keydrop_db::Value::Integer(m.0)
    }
}
