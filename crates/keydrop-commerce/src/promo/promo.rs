//! Promo types and discount computation.

use crate::error::CommerceError;
use crate::ids::PromoId;
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Canonical form of a promo code: trimmed and uppercased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// A discount code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Promo {
    /// Unique promo identifier.
    pub id: PromoId,
    /// Uppercase code buyers enter (e.g., "SAVE10").
    pub code: String,
    /// Percent taken off the cart total, in (0, 100].
    pub discount_percent: i64,
    /// Upper bound on the discount amount. `None` means uncapped.
    #[serde(default)]
    pub max_discount: Option<Money>,
    /// Cart total required before the code applies.
    pub min_purchase: Money,
    /// Times the code has been redeemed.
    pub used_count: i64,
    /// Redemptions allowed. `used_count` never exceeds this.
    pub max_usage: i64,
    #[serde(deserialize_with = "keydrop_db::columns::flag")]
    pub active: bool,
    /// Unix timestamp after which the code is rejected.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Promo {
    /// Discount this promo gives on `total`: the percentage, capped by
    /// `max_discount` and by the total itself.
    pub fn discount_for(&self, total: Money) -> Money {
        if total.is_negative() || total.is_zero() {
            return Money::zero();
        }
        let mut amount = total.percentage(self.discount_percent);
        if let Some(cap) = self.max_discount {
            amount = amount.min(cap);
        }
        amount.min(total).max(Money::zero())
    }

    /// Check if the code is past its expiry.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.map(|at| now > at).unwrap_or(false)
    }

    /// Check if every redemption has been spent.
    pub fn is_exhausted(&self) -> bool {
        self.used_count >= self.max_usage
    }

    /// Redemptions left.
    pub fn remaining_uses(&self) -> i64 {
        (self.max_usage - self.used_count).max(0)
    }

    /// Check the promo against a cart total at time `now` and quote the
    /// discount. Does not record usage.
    pub fn evaluate(&self, total: Money, now: i64) -> Result<PromoQuote, CommerceError> {
        if !self.active {
            return Err(CommerceError::PromoInactive(self.code.clone()));
        }
        if self.is_expired(now) {
            return Err(CommerceError::PromoExpired(self.code.clone()));
        }
        if self.is_exhausted() {
            return Err(CommerceError::PromoUsageLimitReached(self.code.clone()));
        }
        if total < self.min_purchase {
            return Err(CommerceError::BelowMinimumPurchase {
                code: self.code.clone(),
                minimum: self.min_purchase.amount(),
                total: total.amount(),
            });
        }

        let discount_amount = self.discount_for(total);
        Ok(PromoQuote {
            promo_id: self.id.clone(),
            code: self.code.clone(),
            discount_amount,
            final_total: total.saturating_sub_floor(discount_amount),
        })
    }
}

/// Result of validating a promo against a cart total.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromoQuote {
    pub promo_id: PromoId,
    /// Normalized code.
    pub code: String,
    pub discount_amount: Money,
    /// Cart total after the discount.
    pub final_total: Money,
}

/// Input for creating a promo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPromo {
    pub code: String,
    pub discount_percent: i64,
    #[serde(default)]
    pub max_discount: Option<Money>,
    #[serde(default)]
    pub min_purchase: Money,
    pub max_usage: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewPromo {
    /// An active, uncapped percentage promo with no minimum purchase.
    pub fn percentage(code: impl Into<String>, discount_percent: i64, max_usage: i64) -> Self {
        Self {
            code: code.into(),
            discount_percent,
            max_discount: None,
            min_purchase: Money::zero(),
            max_usage,
            expires_at: None,
            active: true,
        }
    }

    /// Cap the discount amount.
    pub fn with_max_discount(mut self, cap: Money) -> Self {
        self.max_discount = Some(cap);
        self
    }

    /// Require a minimum cart total.
    pub fn with_min_purchase(mut self, amount: Money) -> Self {
        self.min_purchase = amount;
        self
    }

    /// Set expiration timestamp.
    pub fn expires_at(mut self, timestamp: i64) -> Self {
        self.expires_at = Some(timestamp);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), CommerceError> {
        if normalize_code(&self.code).is_empty() {
            return Err(CommerceError::InvalidPromo("code is required".into()));
        }
        if self.discount_percent <= 0 || self.discount_percent > 100 {
            return Err(CommerceError::InvalidPromo(format!(
                "discount percent must be in 1..=100, got {}",
                self.discount_percent
            )));
        }
        if self.max_usage < 1 {
            return Err(CommerceError::InvalidPromo(format!(
                "max usage must be at least 1, got {}",
                self.max_usage
            )));
        }
        if self.min_purchase.is_negative() {
            return Err(CommerceError::InvalidPromo(
                "minimum purchase must not be negative".into(),
            ));
        }
        if matches!(self.max_discount, Some(cap) if cap.is_negative()) {
            return Err(CommerceError::InvalidPromo(
                "max discount must not be negative".into(),
            ));
        }
        Ok(())
    }
}
