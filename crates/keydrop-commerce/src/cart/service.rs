//! Persistent cart operations.
//!
//! Every mutation is one read-modify-write inside a transaction, so two
//! rapid requests from the same user cannot lose each other's update.

use super::{Cart, CartItem};
use crate::catalog::{find_game, require_game};
use crate::config::ShopConfig;
use crate::current_timestamp;
use crate::error::CommerceError;
use crate::ids::{CartId, GameId, UserId};
use crate::money::Money;
use crate::promo::{validate_with, PromoQuote};
use keydrop_db::{params, Db, Executor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Cart row as stored; `items` is a JSON document.
#[derive(Debug, Deserialize)]
struct CartRecord {
    id: CartId,
    user_id: UserId,
    #[serde(deserialize_with = "keydrop_db::columns::json")]
    items: Vec<CartItem>,
    promo_code: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<CartRecord> for Cart {
    fn from(r: CartRecord) -> Self {
        Cart {
            id: r.id,
            user_id: r.user_id,
            items: r.items,
            promo_code: r.promo_code,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// A cart line joined with live catalog fields, for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLineView {
    pub game_id: GameId,
    pub title: String,
    pub image_url: Option<String>,
    /// Price captured when the line was added; what checkout charges.
    pub unit_price: Money,
    /// The game's final price right now. `None` if the game is gone.
    pub current_price: Option<Money>,
    pub quantity: i64,
    pub line_total: Money,
    pub is_free: bool,
}

/// A cart as presented to the buyer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartView {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartLineView>,
    pub promo_code: Option<String>,
    pub subtotal: Money,
    pub item_count: i64,
}

/// Cart aggregator.
#[derive(Debug, Clone)]
pub struct CartService {
    db: Db,
    max_quantity: i64,
}

impl CartService {
    pub fn new(db: Db, config: &ShopConfig) -> Self {
        Self {
            db,
            max_quantity: config.max_quantity_per_item,
        }
    }

    /// The user's cart with display fields, created empty on first access.
    pub fn get_cart(&self, user_id: &UserId) -> Result<CartView, CommerceError> {
        self.db.transaction(|tx| {
            let cart = load_or_create(tx, user_id)?;
            build_view(tx, cart)
        })
    }

    /// Add units of a game at its current final price.
    ///
    /// Rejected with [`CommerceError::OutOfStock`] when the game's cached
    /// stock is below the quantity the line would end up with. This is an
    /// early check only; keys are allocated at payment confirmation.
    pub fn add_item(
        &self,
        user_id: &UserId,
        game_id: &GameId,
        quantity: i64,
    ) -> Result<Cart, CommerceError> {
        if quantity <= 0 {
            return Err(CommerceError::InvalidQuantity(quantity));
        }

        self.db.transaction(|tx| {
            let game = require_game(tx, game_id)?;
            if !game.active {
                return Err(CommerceError::InvalidGame(format!(
                    "{} is not for sale",
                    game.title
                )));
            }

            let mut cart = load_or_create(tx, user_id)?;
            let wanted = cart.quantity_of(game_id).saturating_add(quantity);
            if game.stock < wanted {
                return Err(CommerceError::OutOfStock {
                    game_id: game_id.to_string(),
                    requested: wanted,
                    available: game.stock,
                });
            }

            cart.add_item(game.id.clone(), quantity, game.final_price, self.max_quantity)?;
            save_cart(tx, &mut cart)?;

            debug!(user_id = %user_id, game_id = %game_id, units = quantity, "item added to cart");
            Ok(cart)
        })
    }

    /// Set a line's quantity. Zero removes the line.
    pub fn update_quantity(
        &self,
        user_id: &UserId,
        game_id: &GameId,
        quantity: i64,
    ) -> Result<Cart, CommerceError> {
        self.db.transaction(|tx| {
            let mut cart = require_cart(tx, user_id)?;
            if quantity > 0 {
                let game = require_game(tx, game_id)?;
                if game.stock < quantity {
                    return Err(CommerceError::OutOfStock {
                        game_id: game_id.to_string(),
                        requested: quantity,
                        available: game.stock,
                    });
                }
            }

            cart.set_quantity(game_id, quantity, self.max_quantity)?;
            save_cart(tx, &mut cart)?;
            Ok(cart)
        })
    }

    /// Remove every line for a game.
    pub fn remove_item(&self, user_id: &UserId, game_id: &GameId) -> Result<Cart, CommerceError> {
        self.db.transaction(|tx| {
            let mut cart = require_cart(tx, user_id)?;
            if cart.remove_item(game_id) {
                save_cart(tx, &mut cart)?;
                debug!(user_id = %user_id, game_id = %game_id, "item removed from cart");
            }
            Ok(cart)
        })
    }

    /// Empty the cart and drop its promo. The cart itself is kept.
    pub fn clear(&self, user_id: &UserId) -> Result<(), CommerceError> {
        clear_cart(&self.db, user_id)
    }

    /// Add one free unit of a game unless the cart already holds a free line.
    pub fn grant_free_item(&self, user_id: &UserId, game_id: &GameId) -> Result<Cart, CommerceError> {
        self.db.transaction(|tx| {
            require_game(tx, game_id)?;
            let mut cart = load_or_create(tx, user_id)?;
            if cart.grant_free_item(game_id.clone()) {
                save_cart(tx, &mut cart)?;
                info!(user_id = %user_id, game_id = %game_id, "free item granted");
            }
            Ok(cart)
        })
    }

    /// Validate a promo against the cart subtotal and remember it on the cart.
    pub fn apply_promo(&self, user_id: &UserId, code: &str) -> Result<PromoQuote, CommerceError> {
        self.db.transaction(|tx| {
            let mut cart = require_cart(tx, user_id)?;
            let quote = validate_with(tx, code, cart.subtotal()?, current_timestamp())?;
            cart.promo_code = Some(quote.code.clone());
            save_cart(tx, &mut cart)?;
            info!(user_id = %user_id, promo_code = %quote.code, "promo applied to cart");
            Ok(quote)
        })
    }

    /// Drop the cart's promo.
    pub fn remove_promo(&self, user_id: &UserId) -> Result<Cart, CommerceError> {
        self.db.transaction(|tx| {
            let mut cart = require_cart(tx, user_id)?;
            if cart.promo_code.take().is_some() {
                save_cart(tx, &mut cart)?;
            }
            Ok(cart)
        })
    }
}

const CART_COLUMNS: &str = "id, user_id, items, promo_code, created_at, updated_at";

pub(crate) fn load_cart<E: Executor>(
    exec: &E,
    user_id: &UserId,
) -> Result<Option<Cart>, CommerceError> {
    let record: Option<CartRecord> = exec.query_optional(
        &format!("SELECT {} FROM carts WHERE user_id = ?", CART_COLUMNS),
        params![user_id],
    )?;
    Ok(record.map(Cart::from))
}

fn require_cart<E: Executor>(exec: &E, user_id: &UserId) -> Result<Cart, CommerceError> {
    load_cart(exec, user_id)?.ok_or_else(|| CommerceError::CartNotFound(user_id.to_string()))
}

fn load_or_create<E: Executor>(exec: &E, user_id: &UserId) -> Result<Cart, CommerceError> {
    if let Some(cart) = load_cart(exec, user_id)? {
        return Ok(cart);
    }

    let cart = Cart::new(user_id.clone(), current_timestamp());
    exec.execute(
        "INSERT INTO carts (id, user_id, items, promo_code, created_at, updated_at) \
         VALUES (?, ?, '[]', NULL, ?, ?)",
        params![&cart.id, user_id, cart.created_at, cart.updated_at],
    )?;
    debug!(user_id = %user_id, cart_id = %cart.id, "cart created");
    Ok(cart)
}

fn save_cart<E: Executor>(exec: &E, cart: &mut Cart) -> Result<(), CommerceError> {
    cart.updated_at = current_timestamp();
    exec.execute(
        "UPDATE carts SET items = ?, promo_code = ?, updated_at = ? WHERE id = ?",
        params![
            serde_json::to_string(&cart.items)?,
            cart.promo_code.clone(),
            cart.updated_at,
            &cart.id,
        ],
    )?;
    Ok(())
}

/// Empty a user's cart in place. No-op when the user has no cart.
pub(crate) fn clear_cart<E: Executor>(exec: &E, user_id: &UserId) -> Result<(), CommerceError> {
    exec.execute(
        "UPDATE carts SET items = '[]', promo_code = NULL, updated_at = ? WHERE user_id = ?",
        params![current_timestamp(), user_id],
    )?;
    Ok(())
}

fn build_view<E: Executor>(exec: &E, cart: Cart) -> Result<CartView, CommerceError> {
    let subtotal = cart.subtotal()?;
    let item_count = cart.item_count();

    let mut items = Vec::with_capacity(cart.items.len());
    for item in cart.items {
        let game = find_game(exec, &item.game_id)?;
        let line_total = item.line_total().ok_or(CommerceError::Overflow)?;
        items.push(CartLineView {
            title: game.as_ref().map(|g| g.title.clone()).unwrap_or_default(),
            image_url: game.as_ref().and_then(|g| g.image_url.clone()),
            current_price: game.as_ref().map(|g| g.final_price),
            game_id: item.game_id,
            unit_price: item.unit_price,
            quantity: item.quantity,
            line_total,
            is_free: item.is_free,
        });
    }

    Ok(CartView {
        cart_id: cart.id,
        user_id: cart.user_id,
        items,
        promo_code: cart.promo_code,
        subtotal,
        item_count,
    })
}
