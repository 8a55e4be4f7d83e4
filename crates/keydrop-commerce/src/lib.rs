//! Storefront core for selling digital game activation keys.
//!
//! - **Catalog**: games, pricing and the activation key ledger
//! - **Promo**: discount codes with usage limits
//! - **Cart**: one basket per user with captured prices
//! - **Checkout**: orders, payment confirmation and key fulfillment
//! - **Reporting**: revenue, conversion and promo usage
//!
//! Everything is persisted in SQLite through `keydrop-db`. The [`Shop`]
//! facade is the usual entry point.
//!
//! # Example
//!
//! ```rust,ignore
//! use keydrop_commerce::prelude::*;
//!
//! let shop = Shop::open(Db::open("keydrop.db")?, ShopConfig::default())?;
//!
//! let game = shop.create_game(
//!     NewGame::new("Hollow Knight", Money::new(150_000))
//!         .with_discount(20, DiscountKind::Percentage),
//! )?;
//! shop.add_keys(&game.id, ["HK-AAAA-1111", "HK-BBBB-2222"])?;
//!
//! let alice = UserId::new("alice");
//! shop.add_item(&alice, &game.id, 1)?;
//! let order = shop.checkout(&alice, PaymentMethod::BankTransfer, None)?;
//!
//! // Later, from the payment provider's callback:
//! let result = shop.confirm_payment(&order.order_id, "pay_123")?;
//! println!("{}", result.message);
//! ```

pub mod error;
pub mod ids;
pub mod money;
pub mod config;
pub mod schema;

pub mod catalog;
pub mod promo;
pub mod cart;
pub mod checkout;
pub mod reporting;
pub mod shop;

pub use config::ShopConfig;
pub use error::{CommerceError, ErrorKind};
pub use ids::*;
pub use money::{Currency, Money};
pub use shop::Shop;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::ShopConfig;
    pub use crate::error::{CommerceError, ErrorKind};
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};
    pub use crate::shop::Shop;
    pub use keydrop_db::Db;

    // Catalog
    pub use crate::catalog::{ActivationKey, DiscountKind, Game, NewGame, PricingUpdate};

    // Promo
    pub use crate::promo::{NewPromo, Promo, PromoQuote};

    // Cart
    pub use crate::cart::{Cart, CartItem, CartLineView, CartView};

    // Checkout
    pub use crate::checkout::{
        DeliveredKey, FulfillmentResult, Order, OrderItem, OrderStatus, OrderSummary,
        PaymentMethod,
    };

    // Reporting
    pub use crate::reporting::{Analytics, BestSeller, PromoStats};
}

/// Current Unix timestamp in seconds.
pub(crate) fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
