//! Commerce error types.

use crate::checkout::OrderStatus;
use thiserror::Error;

/// Broad category of a [`CommerceError`], for callers that map failures onto
/// transport-level responses (HTTP status, CLI exit message, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A cart, order, game, key or promo does not exist.
    NotFound,
    /// A unique value already exists or a key was already used.
    Conflict,
    /// The operation is not allowed in the current state.
    InvalidState,
    /// The input or business rules rejected the request.
    Validation,
    /// Storage or serialization failure.
    Internal,
}

/// Errors that can occur in storefront operations.
#[derive(Error, Debug)]
pub enum CommerceError {
    /// Game not found.
    #[error("Game not found: {0}")]
    GameNotFound(String),

    /// Activation key not found.
    #[error("Activation key not found: {0}")]
    KeyNotFound(String),

    /// Cart not found.
    #[error("Cart not found for user: {0}")]
    CartNotFound(String),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Promo code not found.
    #[error("Promo code not found: {0}")]
    PromoNotFound(String),

    /// Game is not in the cart.
    #[error("Item not in cart: {0}")]
    ItemNotInCart(String),

    /// Promo code already exists.
    #[error("Promo code already exists: {0}")]
    PromoCodeTaken(String),

    /// Activation key string already provisioned.
    #[error("Activation key already exists: {0}")]
    KeyAlreadyExists(String),

    /// Activation key was already bound to an order.
    #[error("Activation key already used: {0}")]
    KeyAlreadyUsed(String),

    /// Checkout attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Payment confirmation for an order that is no longer pending.
    #[error("Order {order_id} is not pending (status: {status})")]
    NotPending { order_id: String, status: OrderStatus },

    /// Illegal order status transition.
    #[error("Invalid order transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Not enough cached stock for the requested quantity.
    #[error("Insufficient stock for {game_id}: requested {requested}, available {available}")]
    OutOfStock {
        game_id: String,
        requested: i64,
        available: i64,
    },

    /// Invalid quantity.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Quantity exceeds maximum allowed.
    #[error("Quantity {0} exceeds maximum allowed ({1})")]
    QuantityExceedsLimit(i64, i64),

    /// Promo code is deactivated.
    #[error("Promo code is inactive: {0}")]
    PromoInactive(String),

    /// Promo code is past its expiry.
    #[error("Promo code expired: {0}")]
    PromoExpired(String),

    /// Promo code has been used its maximum number of times.
    #[error("Promo code usage limit reached: {0}")]
    PromoUsageLimitReached(String),

    /// Cart total is below the promo's minimum purchase.
    #[error("Minimum purchase for {code} is {minimum}, cart total is {total}")]
    BelowMinimumPurchase {
        code: String,
        minimum: i64,
        total: i64,
    },

    /// Promo definition rejected.
    #[error("Invalid promo: {0}")]
    InvalidPromo(String),

    /// Game definition rejected, or game not sellable.
    #[error("Invalid game: {0}")]
    InvalidGame(String),

    /// Arithmetic overflow.
    #[error("Arithmetic overflow in money calculation")]
    Overflow,

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] keydrop_db::DbError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CommerceError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        use CommerceError::*;
        match self {
            GameNotFound(_) | KeyNotFound(_) | CartNotFound(_) | OrderNotFound(_)
            | PromoNotFound(_) | ItemNotInCart(_) => ErrorKind::NotFound,
            PromoCodeTaken(_) | KeyAlreadyExists(_) | KeyAlreadyUsed(_) => ErrorKind::Conflict,
            EmptyCart | NotPending { .. } | InvalidTransition { .. } => ErrorKind::InvalidState,
            OutOfStock { .. }
            | InvalidQuantity(_)
            | QuantityExceedsLimit(..)
            | PromoInactive(_)
            | PromoExpired(_)
            | PromoUsageLimitReached(_)
            | BelowMinimumPurchase { .. }
            | InvalidPromo(_)
            | InvalidGame(_) => ErrorKind::Validation,
            Overflow | Database(_) | Serialization(_) => ErrorKind::Internal,
        }
    }
}
