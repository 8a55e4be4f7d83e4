//! Persistent promo store.

use super::{normalize_code, NewPromo, Promo, PromoQuote};
use crate::current_timestamp;
use crate::error::CommerceError;
use crate::ids::PromoId;
use crate::money::Money;
use keydrop_db::{params, Db, Executor};
use tracing::{debug, info};

const PROMO_COLUMNS: &str = "id, code, discount_percent, max_discount, min_purchase, \
                             used_count, max_usage, active, expires_at, created_at, updated_at";

/// Promo code engine backed by the `promos` table.
#[derive(Debug, Clone)]
pub struct PromoEngine {
    db: Db,
}

impl PromoEngine {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create a promo. The code is stored uppercase and must be unique.
    pub fn create_promo(&self, input: NewPromo) -> Result<Promo, CommerceError> {
        input.validate()?;
        let now = current_timestamp();
        let promo = Promo {
            id: PromoId::generate(),
            code: normalize_code(&input.code),
            discount_percent: input.discount_percent,
            max_discount: input.max_discount,
            min_purchase: input.min_purchase,
            used_count: 0,
            max_usage: input.max_usage,
            active: input.active,
            expires_at: input.expires_at,
            created_at: now,
            updated_at: now,
        };

        self.db
            .execute(
                &format!(
                    "INSERT INTO promos ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    PROMO_COLUMNS
                ),
                params![
                    &promo.id,
                    &promo.code,
                    promo.discount_percent,
                    promo.max_discount,
                    promo.min_purchase,
                    promo.used_count,
                    promo.max_usage,
                    promo.active,
                    promo.expires_at,
                    promo.created_at,
                    promo.updated_at,
                ],
            )
            .map_err(|e| {
                if e.is_constraint() {
                    CommerceError::PromoCodeTaken(promo.code.clone())
                } else {
                    e.into()
                }
            })?;

        info!(promo_code = %promo.code, percent = promo.discount_percent, "promo created");
        Ok(promo)
    }

    /// Validate `code` against a cart total and quote the discount.
    ///
    /// Read-only; usage is not incremented.
    pub fn validate(&self, code: &str, cart_total: Money) -> Result<PromoQuote, CommerceError> {
        validate_with(&self.db, code, cart_total, current_timestamp())
    }

    /// Record one redemption.
    ///
    /// The increment is conditional on `used_count < max_usage`, so
    /// concurrent callers can never push usage past the limit.
    pub fn mark_used(&self, promo_id: &PromoId) -> Result<(), CommerceError> {
        mark_used_with(&self.db, promo_id)
    }

    /// Activate or deactivate a code.
    pub fn set_active(&self, code: &str, active: bool) -> Result<Promo, CommerceError> {
        let code = normalize_code(code);
        let changed = self.db.execute(
            "UPDATE promos SET active = ?, updated_at = ? WHERE code = ?",
            params![active, current_timestamp(), &code],
        )?;
        if changed == 0 {
            return Err(CommerceError::PromoNotFound(code));
        }
        self.get_promo(&code)
    }

    /// Look up a promo by code (case-insensitive).
    pub fn get_promo(&self, code: &str) -> Result<Promo, CommerceError> {
        let code = normalize_code(code);
        find_promo(&self.db, &code)?.ok_or(CommerceError::PromoNotFound(code))
    }

    /// All promos, newest first.
    pub fn list_promos(&self) -> Result<Vec<Promo>, CommerceError> {
        Ok(self.db.query_as(
            &format!(
                "SELECT {} FROM promos ORDER BY created_at DESC, code",
                PROMO_COLUMNS
            ),
            params![],
        )?)
    }
}

fn find_promo<E: Executor>(exec: &E, code: &str) -> Result<Option<Promo>, CommerceError> {
    Ok(exec.query_optional(
        &format!("SELECT {} FROM promos WHERE code = ?", PROMO_COLUMNS),
        params![code],
    )?)
}

pub(crate) fn validate_with<E: Executor>(
    exec: &E,
    code: &str,
    cart_total: Money,
    now: i64,
) -> Result<PromoQuote, CommerceError> {
    let code = normalize_code(code);
    let promo = find_promo(exec, &code)?.ok_or_else(|| CommerceError::PromoNotFound(code.clone()))?;
    let quote = promo.evaluate(cart_total, now)?;
    debug!(promo_code = %quote.code, discount = %quote.discount_amount, "promo validated");
    Ok(quote)
}

pub(crate) fn mark_used_with<E: Executor>(
    exec: &E,
    promo_id: &PromoId,
) -> Result<(), CommerceError> {
    let changed = exec.execute(
        "UPDATE promos SET used_count = used_count + 1, updated_at = ? \
         WHERE id = ? AND used_count < max_usage",
        params![current_timestamp(), promo_id],
    )?;
    if changed == 1 {
        return Ok(());
    }

    let exists = exec.query_i64("SELECT COUNT(*) FROM promos WHERE id = ?", params![promo_id])?;
    if exists == 0 {
        Err(CommerceError::PromoNotFound(promo_id.to_string()))
    } else {
        Err(CommerceError::PromoUsageLimitReached(promo_id.to_string()))
    }
}
