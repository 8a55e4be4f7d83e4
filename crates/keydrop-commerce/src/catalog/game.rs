//! Game (sellable item) types and price computation.

use crate::error::CommerceError;
use crate::ids::GameId;
use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a game's `discount` field is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountKind {
    /// `discount` is a percentage of the base price.
    #[default]
    Percentage,
    /// `discount` is an amount subtracted from the base price.
    Fixed,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage => "PERCENTAGE",
            DiscountKind::Fixed => "FIXED",
        }
    }
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountKind {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PERCENTAGE" | "PERCENT" | "%" => Ok(DiscountKind::Percentage),
            "FIXED" => Ok(DiscountKind::Fixed),
            other => Err(CommerceError::InvalidGame(format!(
                "unknown discount kind '{}'",
                other
            ))),
        }
    }
}

/// Sale price of a game.
///
/// `Percentage` yields `base * (1 - discount/100)` kept within `[0, base]`;
/// `Fixed` yields `max(0, base - discount)`. The discount range itself is not
/// validated here.
///
/// ```
/// use keydrop_commerce::catalog::{compute_final_price, DiscountKind};
/// use keydrop_commerce::Money;
///
/// assert_eq!(
///     compute_final_price(Money::new(100_000), 20, DiscountKind::Percentage),
///     Money::new(80_000)
/// );
/// assert_eq!(
///     compute_final_price(Money::new(100), 500, DiscountKind::Fixed),
///     Money::zero()
/// );
/// ```
pub fn compute_final_price(base: Money, discount: i64, kind: DiscountKind) -> Money {
    match kind {
        DiscountKind::Percentage => {
            let price = base.percentage(100_i64.saturating_sub(discount));
            price.clamp(Money::zero(), base.max(Money::zero()))
        }
        DiscountKind::Fixed => base.saturating_sub_floor(Money::new(discount)),
    }
}

/// A sellable game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Game {
    /// Unique game identifier.
    pub id: GameId,
    /// Display title.
    pub title: String,
    /// Cover image for storefront display.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Price before discount.
    pub base_price: Money,
    /// Discount value, meaning depends on `discount_kind`.
    pub discount: i64,
    /// How `discount` is applied.
    pub discount_kind: DiscountKind,
    /// Price buyers pay; always derived from the three fields above.
    pub final_price: Money,
    /// Cached count of unused keys. Advisory.
    pub stock: i64,
    /// Whether the game can be added to carts.
    #[serde(deserialize_with = "keydrop_db::columns::flag")]
    pub active: bool,
    /// Unix timestamp of creation.
    pub created_at: i64,
    /// Unix timestamp of last update.
    pub updated_at: i64,
}

impl Game {
    /// Recompute `final_price` from the pricing fields.
    pub fn reprice(&mut self) {
        self.final_price = compute_final_price(self.base_price, self.discount, self.discount_kind);
    }

    /// Apply a pricing change and recompute the final price.
    pub fn apply_pricing(&mut self, update: &PricingUpdate) {
        if let Some(base) = update.base_price {
            self.base_price = base;
        }
        if let Some(discount) = update.discount {
            self.discount = discount;
        }
        if let Some(kind) = update.discount_kind {
            self.discount_kind = kind;
        }
        self.reprice();
    }

    /// Whether the game is on sale below its base price.
    pub fn is_discounted(&self) -> bool {
        self.final_price < self.base_price
    }
}

/// Input for creating a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewGame {
    pub title: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub base_price: Money,
    #[serde(default)]
    pub discount: i64,
    #[serde(default)]
    pub discount_kind: DiscountKind,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewGame {
    /// A full-price, active game.
    pub fn new(title: impl Into<String>, base_price: Money) -> Self {
        Self {
            title: title.into(),
            image_url: None,
            base_price,
            discount: 0,
            discount_kind: DiscountKind::Percentage,
            active: true,
        }
    }

    /// Set the discount.
    pub fn with_discount(mut self, discount: i64, kind: DiscountKind) -> Self {
        self.discount = discount;
        self.discount_kind = kind;
        self
    }

    /// Set the cover image.
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), CommerceError> {
        if self.title.trim().is_empty() {
            return Err(CommerceError::InvalidGame("title is required".into()));
        }
        validate_pricing(self.base_price, self.discount)
    }
}

/// Partial update of a game's pricing fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PricingUpdate {
    pub base_price: Option<Money>,
    pub discount: Option<i64>,
    pub discount_kind: Option<DiscountKind>,
}

impl PricingUpdate {
    pub fn is_empty(&self) -> bool {
        self.base_price.is_none() && self.discount.is_none() && self.discount_kind.is_none()
    }
}

pub(crate) fn validate_pricing(base_price: Money, discount: i64) -> Result<(), CommerceError> {
    if base_price.is_negative() {
        return Err(CommerceError::InvalidGame(format!(
            "base price must not be negative, got {}",
            base_price
        )));
    }
    if discount < 0 {
        return Err(CommerceError::InvalidGame(format!(
            "discount must not be negative, got {}",
            discount
        )));
    }
    Ok(())
}
