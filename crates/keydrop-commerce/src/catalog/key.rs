//! Activation key type.

use crate::ids::{GameId, KeyId, OrderId};
use serde::{Deserialize, Serialize};

/// A single-use activation key for a game.
///
/// `used` flips to true exactly once, at the same moment `order_id` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivationKey {
    pub id: KeyId,
    pub game_id: GameId,
    /// The secret redeemable string.
    pub key_code: String,
    #[serde(deserialize_with = "keydrop_db::columns::flag")]
    pub used: bool,
    pub order_id: Option<OrderId>,
    pub created_at: i64,
    pub used_at: Option<i64>,
}
