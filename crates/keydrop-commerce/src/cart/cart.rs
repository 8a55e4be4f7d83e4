//! Cart and line item types.

use crate::error::CommerceError;
use crate::ids::{CartId, GameId, UserId};
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// A line in a cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    pub game_id: GameId,
    /// Units on this line, at least 1.
    pub quantity: i64,
    /// Final price of the game when the line was added.
    pub unit_price: Money,
    /// Zero-price line injected by [`Cart::grant_free_item`].
    #[serde(default)]
    pub is_free: bool,
}

impl CartItem {
    /// `unit_price * quantity`, `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// A user's cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    /// Lines in insertion order.
    pub items: Vec<CartItem>,
    /// Normalized code of the promo applied through the cart, if any.
    pub promo_code: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Cart {
    /// An empty cart for `user_id`.
    pub fn new(user_id: UserId, now: i64) -> Self {
        Self {
            id: CartId::generate(),
            user_id,
            items: Vec::new(),
            promo_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add `quantity` units of a game at `unit_price`.
    ///
    /// Units of a game already in the cart are merged into its line; the
    /// line keeps the price it was first added at. Returns the line's new
    /// quantity.
    pub fn add_item(
        &mut self,
        game_id: GameId,
        quantity: i64,
        unit_price: Money,
        max_quantity: i64,
    ) -> Result<i64, CommerceError> {
        if quantity <= 0 {
            return Err(CommerceError::InvalidQuantity(quantity));
        }

        let merged = self.quantity_of(&game_id).saturating_add(quantity);
        if merged > max_quantity {
            return Err(CommerceError::QuantityExceedsLimit(merged, max_quantity));
        }

        match self.paid_line_mut(&game_id) {
            Some(line) => line.quantity = merged,
            None => self.items.push(CartItem {
                game_id,
                quantity,
                unit_price,
                is_free: false,
            }),
        }
        Ok(merged)
    }

    /// Replace the quantity of a game's line. Zero removes the line.
    pub fn set_quantity(
        &mut self,
        game_id: &GameId,
        quantity: i64,
        max_quantity: i64,
    ) -> Result<(), CommerceError> {
        if quantity < 0 {
            return Err(CommerceError::InvalidQuantity(quantity));
        }
        if quantity > max_quantity {
            return Err(CommerceError::QuantityExceedsLimit(quantity, max_quantity));
        }
        if quantity == 0 {
            self.items.retain(|item| item.is_free || &item.game_id != game_id);
            return Ok(());
        }

        let line = self
            .paid_line_mut(game_id)
            .ok_or_else(|| CommerceError::ItemNotInCart(game_id.to_string()))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Drop every line for a game. Returns whether anything was removed.
    pub fn remove_item(&mut self, game_id: &GameId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.game_id != game_id);
        self.items.len() != before
    }

    /// Empty the cart and drop its applied promo.
    pub fn clear(&mut self) {
        self.items.clear();
        self.promo_code = None;
    }

    /// Append a zero-price free line, unless the cart already has one.
    /// Returns whether a line was added.
    pub fn grant_free_item(&mut self, game_id: GameId) -> bool {
        if self.has_free_item() {
            return false;
        }
        self.items.push(CartItem {
            game_id,
            quantity: 1,
            unit_price: Money::zero(),
            is_free: true,
        });
        true
    }

    /// `Σ unit_price × quantity`.
    pub fn subtotal(&self) -> Result<Money, CommerceError> {
        self.items
            .iter()
            .map(|item| item.line_total().ok_or(CommerceError::Overflow))
            .try_fold(Money::zero(), |acc, line| {
                acc.checked_add(line?).ok_or(CommerceError::Overflow)
            })
    }

    /// Total units across all lines.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Units of a game on its paid line.
    pub fn quantity_of(&self, game_id: &GameId) -> i64 {
        self.items
            .iter()
            .filter(|item| !item.is_free && &item.game_id == game_id)
            .map(|item| item.quantity)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_free_item(&self) -> bool {
        self.items.iter().any(|item| item.is_free)
    }

    fn paid_line_mut(&mut self, game_id: &GameId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| !item.is_free && &item.game_id == game_id)
    }
}
