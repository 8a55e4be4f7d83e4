//! Stock ledger: game records, key provisioning and key consumption.

use super::game::validate_pricing;
use super::{ActivationKey, Game, NewGame, PricingUpdate};
use crate::current_timestamp;
use crate::error::CommerceError;
use crate::ids::{GameId, KeyId, OrderId};
use keydrop_db::{params, Db, Executor};
use tracing::{debug, info};

const GAME_COLUMNS: &str = "id, title, image_url, base_price, discount, discount_kind, \
                            final_price, stock, active, created_at, updated_at";

const KEY_COLUMNS: &str = "id, game_id, key_code, used, order_id, created_at, used_at";

/// Catalog and key store.
#[derive(Debug, Clone)]
pub struct StockLedger {
    db: Db,
}

impl StockLedger {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create a game with its final price computed from the pricing fields.
    pub fn create_game(&self, input: NewGame) -> Result<Game, CommerceError> {
        input.validate()?;
        let now = current_timestamp();
        let mut game = Game {
            id: GameId::generate(),
            title: input.title.trim().to_string(),
            image_url: input.image_url,
            base_price: input.base_price,
            discount: input.discount,
            discount_kind: input.discount_kind,
            final_price: input.base_price,
            stock: 0,
            active: input.active,
            created_at: now,
            updated_at: now,
        };
        game.reprice();

        self.db.execute(
            &format!(
                "INSERT INTO games ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                GAME_COLUMNS
            ),
            params![
                &game.id,
                &game.title,
                game.image_url.clone(),
                game.base_price,
                game.discount,
                game.discount_kind.as_str(),
                game.final_price,
                game.stock,
                game.active,
                game.created_at,
                game.updated_at,
            ],
        )?;

        info!(game_id = %game.id, title = %game.title, final_price = %game.final_price, "game created");
        Ok(game)
    }

    /// Change base price and/or discount; the final price is recomputed.
    pub fn update_pricing(
        &self,
        game_id: &GameId,
        update: PricingUpdate,
    ) -> Result<Game, CommerceError> {
        self.db.transaction(|tx| {
            let mut game = require_game(tx, game_id)?;
            game.apply_pricing(&update);
            validate_pricing(game.base_price, game.discount)?;
            game.updated_at = current_timestamp();

            tx.execute(
                "UPDATE games SET base_price = ?, discount = ?, discount_kind = ?, \
                 final_price = ?, updated_at = ? WHERE id = ?",
                params![
                    game.base_price,
                    game.discount,
                    game.discount_kind.as_str(),
                    game.final_price,
                    game.updated_at,
                    &game.id,
                ],
            )?;

            info!(game_id = %game.id, final_price = %game.final_price, "game repriced");
            Ok(game)
        })
    }

    /// Activate or deactivate a game.
    pub fn set_active(&self, game_id: &GameId, active: bool) -> Result<Game, CommerceError> {
        let changed = self.db.execute(
            "UPDATE games SET active = ?, updated_at = ? WHERE id = ?",
            params![active, current_timestamp(), game_id],
        )?;
        if changed == 0 {
            return Err(CommerceError::GameNotFound(game_id.to_string()));
        }
        require_game(&self.db, game_id)
    }

    /// Get a game by ID.
    pub fn get_game(&self, game_id: &GameId) -> Result<Game, CommerceError> {
        require_game(&self.db, game_id)
    }

    /// List games by title.
    pub fn list_games(&self, active_only: bool) -> Result<Vec<Game>, CommerceError> {
        let sql = if active_only {
            format!("SELECT {} FROM games WHERE active = 1 ORDER BY title", GAME_COLUMNS)
        } else {
            format!("SELECT {} FROM games ORDER BY title", GAME_COLUMNS)
        };
        Ok(self.db.query_as(&sql, params![])?)
    }

    /// Provision unused keys for a game and raise its cached stock.
    ///
    /// All keys are inserted or none are; a key string that already exists
    /// anywhere fails the batch with [`CommerceError::KeyAlreadyExists`].
    pub fn add_keys<I, S>(&self, game_id: &GameId, keys: I) -> Result<usize, CommerceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys
            .into_iter()
            .map(Into::into)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        self.db.transaction(|tx| {
            require_game(tx, game_id)?;
            let now = current_timestamp();

            for key in &keys {
                tx.execute(
                    "INSERT INTO activation_keys (id, game_id, key_code, used, created_at) \
                     VALUES (?, ?, ?, 0, ?)",
                    params![&KeyId::generate(), game_id, key, now],
                )
                .map_err(|e| {
                    if e.is_constraint() {
                        CommerceError::KeyAlreadyExists(key.clone())
                    } else {
                        e.into()
                    }
                })?;
            }

            tx.execute(
                "UPDATE games SET stock = stock + ?, updated_at = ? WHERE id = ?",
                params![keys.len() as i64, now, game_id],
            )?;

            info!(game_id = %game_id, added = keys.len(), "keys provisioned");
            Ok(keys.len())
        })
    }

    /// Number of unused keys, the authoritative availability figure.
    pub fn count_unused_keys(&self, game_id: &GameId) -> Result<i64, CommerceError> {
        Ok(self.db.query_i64(
            "SELECT COUNT(*) FROM activation_keys WHERE game_id = ? AND used = 0",
            params![game_id],
        )?)
    }

    /// Oldest unused key for a game, if any.
    ///
    /// Read-only: between this call and [`mark_key_used`](Self::mark_key_used)
    /// another caller may take the key, which `mark_key_used` detects.
    pub fn claim_unused_key(&self, game_id: &GameId) -> Result<Option<ActivationKey>, CommerceError> {
        Ok(self.db.query_optional(
            &format!(
                "SELECT {} FROM activation_keys WHERE game_id = ? AND used = 0 \
                 ORDER BY created_at ASC, seq ASC LIMIT 1",
                KEY_COLUMNS
            ),
            params![game_id],
        )?)
    }

    /// Bind a key to an order.
    ///
    /// Conditional on the key still being unused, so of two racing callers
    /// exactly one wins and the other gets [`CommerceError::KeyAlreadyUsed`].
    pub fn mark_key_used(&self, key_id: &KeyId, order_id: &OrderId) -> Result<(), CommerceError> {
        mark_key_used(&self.db, key_id, order_id)
    }

    /// Lower a game's cached stock by `n`, flooring at zero.
    pub fn decrement_stock(&self, game_id: &GameId, n: i64) -> Result<(), CommerceError> {
        decrement_stock(&self.db, game_id, n)
    }

    /// All keys bound to an order.
    pub fn keys_for_order(&self, order_id: &OrderId) -> Result<Vec<ActivationKey>, CommerceError> {
        Ok(self.db.query_as(
            &format!(
                "SELECT {} FROM activation_keys WHERE order_id = ? ORDER BY seq",
                KEY_COLUMNS
            ),
            params![order_id],
        )?)
    }
}

pub(crate) fn find_game<E: Executor>(
    exec: &E,
    game_id: &GameId,
) -> Result<Option<Game>, CommerceError> {
    Ok(exec.query_optional(
        &format!("SELECT {} FROM games WHERE id = ?", GAME_COLUMNS),
        params![game_id],
    )?)
}

pub(crate) fn require_game<E: Executor>(exec: &E, game_id: &GameId) -> Result<Game, CommerceError> {
    find_game(exec, game_id)?.ok_or_else(|| CommerceError::GameNotFound(game_id.to_string()))
}

pub(crate) fn mark_key_used<E: Executor>(
    exec: &E,
    key_id: &KeyId,
    order_id: &OrderId,
) -> Result<(), CommerceError> {
    let changed = exec.execute(
        "UPDATE activation_keys SET used = 1, order_id = ?, used_at = ? WHERE id = ? AND used = 0",
        params![order_id, current_timestamp(), key_id],
    )?;
    if changed == 1 {
        return Ok(());
    }

    let exists = exec.query_i64(
        "SELECT COUNT(*) FROM activation_keys WHERE id = ?",
        params![key_id],
    )?;
    if exists == 0 {
        Err(CommerceError::KeyNotFound(key_id.to_string()))
    } else {
        Err(CommerceError::KeyAlreadyUsed(key_id.to_string()))
    }
}

/// Take the oldest unused key of a game and bind it to `order_id` in one
/// conditional statement. `None` means the game has no keys left.
pub(crate) fn claim_next_key<E: Executor>(
    exec: &E,
    game_id: &GameId,
    order_id: &OrderId,
) -> Result<Option<ActivationKey>, CommerceError> {
    let key: Option<ActivationKey> = exec.query_optional(
        &format!(
            "UPDATE activation_keys SET used = 1, order_id = ?1, used_at = ?2 \
             WHERE seq = (\
                 SELECT seq FROM activation_keys \
                 WHERE game_id = ?3 AND used = 0 \
                 ORDER BY created_at ASC, seq ASC LIMIT 1\
             ) AND used = 0 \
             RETURNING {}",
            KEY_COLUMNS
        ),
        params![order_id, current_timestamp(), game_id],
    )?;

    if let Some(key) = &key {
        debug!(game_id = %game_id, order_id = %order_id, key_id = %key.id, "key claimed");
    }
    Ok(key)
}

pub(crate) fn decrement_stock<E: Executor>(
    exec: &E,
    game_id: &GameId,
    n: i64,
) -> Result<(), CommerceError> {
    let changed = exec.execute(
        "UPDATE games SET stock = MAX(0, stock - ?), updated_at = ? WHERE id = ?",
        params![n.max(0), current_timestamp(), game_id],
    )?;
    if changed == 0 {
        return Err(CommerceError::GameNotFound(game_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DiscountKind;
    use crate::money::Money;
    use crate::schema;

    fn ledger() -> StockLedger {
        let db = Db::open_in_memory().unwrap();
        schema::migrate(&db).unwrap();
        StockLedger::new(db)
    }

    fn game(ledger: &StockLedger) -> Game {
        ledger
            .create_game(
                NewGame::new("Stardew Valley", Money::new(100_000))
                    .with_discount(20, DiscountKind::Percentage),
            )
            .unwrap()
    }

    #[test]
    fn test_create_game_computes_final_price() {
        let ledger = ledger();
        let game = game(&ledger);
        assert_eq!(game.final_price, Money::new(80_000));
        assert_eq!(ledger.get_game(&game.id).unwrap(), game);
    }

    #[test]
    fn test_update_pricing_recomputes_final_price() {
        let ledger = ledger();
        let game = game(&ledger);
        let updated = ledger
            .update_pricing(
                &game.id,
                PricingUpdate {
                    discount: Some(30_000),
                    discount_kind: Some(DiscountKind::Fixed),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.final_price, Money::new(70_000));
        assert_eq!(ledger.get_game(&game.id).unwrap().final_price, Money::new(70_000));
    }

    #[test]
    fn test_add_keys_raises_stock() {
        let ledger = ledger();
        let game = game(&ledger);
        assert_eq!(ledger.add_keys(&game.id, ["AAA", "BBB", " "]).unwrap(), 2);
        assert_eq!(ledger.get_game(&game.id).unwrap().stock, 2);
        assert_eq!(ledger.count_unused_keys(&game.id).unwrap(), 2);
    }

    #[test]
    fn test_duplicate_key_rejects_whole_batch() {
        let ledger = ledger();
        let game = game(&ledger);
        ledger.add_keys(&game.id, ["AAA"]).unwrap();
        let err = ledger.add_keys(&game.id, ["BBB", "AAA"]).unwrap_err();
        assert!(matches!(err, CommerceError::KeyAlreadyExists(k) if k == "AAA"));
        assert_eq!(ledger.count_unused_keys(&game.id).unwrap(), 1);
        assert_eq!(ledger.get_game(&game.id).unwrap().stock, 1);
    }

    #[test]
    fn test_claim_is_fifo() {
        let ledger = ledger();
        let game = game(&ledger);
        ledger.add_keys(&game.id, ["FIRST", "SECOND"]).unwrap();
        let key = ledger.claim_unused_key(&game.id).unwrap().unwrap();
        assert_eq!(key.key_code, "FIRST");
        assert!(!key.used);
    }

    #[test]
    fn test_mark_key_used_twice_conflicts() {
        let ledger = ledger();
        let game = game(&ledger);
        ledger.add_keys(&game.id, ["ONLY"]).unwrap();
        let key = ledger.claim_unused_key(&game.id).unwrap().unwrap();
        let order_a = OrderId::new("ord_a");
        let order_b = OrderId::new("ord_b");

        ledger.mark_key_used(&key.id, &order_a).unwrap();
        let err = ledger.mark_key_used(&key.id, &order_b).unwrap_err();
        assert!(matches!(err, CommerceError::KeyAlreadyUsed(_)));
        assert!(ledger.claim_unused_key(&game.id).unwrap().is_none());

        let bound = ledger.keys_for_order(&order_a).unwrap();
        assert_eq!(bound.len(), 1);
        assert!(bound[0].used);
    }

    #[test]
    fn test_mark_unknown_key() {
        let ledger = ledger();
        let err = ledger
            .mark_key_used(&KeyId::new("nope"), &OrderId::new("ord"))
            .unwrap_err();
        assert!(matches!(err, CommerceError::KeyNotFound(_)));
    }

    #[test]
    fn test_claim_next_key_exhausts() {
        let ledger = ledger();
        let game = game(&ledger);
        ledger.add_keys(&game.id, ["K1"]).unwrap();
        let order = OrderId::new("ord_1");

        let first = claim_next_key(&ledger.db, &game.id, &order).unwrap().unwrap();
        assert_eq!(first.key_code, "K1");
        assert_eq!(first.order_id, Some(order.clone()));
        assert!(claim_next_key(&ledger.db, &game.id, &order).unwrap().is_none());
    }

    #[test]
    fn test_decrement_stock_clamps_at_zero() {
        let ledger = ledger();
        let game = game(&ledger);
        ledger.add_keys(&game.id, ["K1"]).unwrap();
        ledger.decrement_stock(&game.id, 5).unwrap();
        assert_eq!(ledger.get_game(&game.id).unwrap().stock, 0);
    }

    #[test]
    fn test_set_active_and_list() {
        let ledger = ledger();
        let game = game(&ledger);
        ledger.set_active(&game.id, false).unwrap();
        assert!(ledger.list_games(true).unwrap().is_empty());
        assert_eq!(ledger.list_games(false).unwrap().len(), 1);
        assert!(matches!(
            ledger.set_active(&GameId::new("missing"), true),
            Err(CommerceError::GameNotFound(_))
        ));
    }
}
