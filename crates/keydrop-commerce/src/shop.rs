//! The storefront facade.
//!
//! [`Shop`] wires the components onto one database and exposes the
//! operations an API, CLI or UI layer calls. It is cheap to clone and can
//! be shared across threads.

use crate::cart::{Cart, CartService, CartView};
use crate::catalog::{Game, NewGame, PricingUpdate, StockLedger};
use crate::checkout::{Checkout, FulfillmentResult, Order, OrderSummary, PaymentMethod};
use crate::config::ShopConfig;
use crate::error::CommerceError;
use crate::ids::{GameId, OrderId, UserId};
use crate::money::Money;
use crate::promo::{NewPromo, Promo, PromoEngine, PromoQuote};
use crate::reporting::{Analytics, BestSeller, PromoStats, Reporting};
use crate::schema;
use keydrop_db::Db;

/// Storefront core.
#[derive(Debug, Clone)]
pub struct Shop {
    db: Db,
    config: ShopConfig,
    ledger: StockLedger,
    promos: PromoEngine,
    carts: CartService,
    checkout: Checkout,
    reporting: Reporting,
}

impl Shop {
    /// Build a shop on `db`, creating the schema if needed.
    pub fn open(db: Db, config: ShopConfig) -> Result<Self, CommerceError> {
        schema::migrate(&db)?;
        Ok(Self {
            ledger: StockLedger::new(db.clone()),
            promos: PromoEngine::new(db.clone()),
            carts: CartService::new(db.clone(), &config),
            checkout: Checkout::new(db.clone(), &config),
            reporting: Reporting::new(db.clone()),
            db,
            config,
        })
    }

    /// A shop on a private in-memory database.
    pub fn open_in_memory(config: ShopConfig) -> Result<Self, CommerceError> {
        Self::open(Db::open_in_memory()?, config)
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn config(&self) -> &ShopConfig {
        &self.config
    }

    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    pub fn promos(&self) -> &PromoEngine {
        &self.promos
    }

    pub fn carts(&self) -> &CartService {
        &self.carts
    }

    pub fn checkout_pipeline(&self) -> &Checkout {
        &self.checkout
    }

    pub fn reporting(&self) -> &Reporting {
        &self.reporting
    }

    // Catalog administration

    pub fn create_game(&self, input: NewGame) -> Result<Game, CommerceError> {
        self.ledger.create_game(input)
    }

    pub fn update_game_pricing(
        &self,
        game_id: &GameId,
        update: PricingUpdate,
    ) -> Result<Game, CommerceError> {
        self.ledger.update_pricing(game_id, update)
    }

    pub fn set_game_active(&self, game_id: &GameId, active: bool) -> Result<Game, CommerceError> {
        self.ledger.set_active(game_id, active)
    }

    pub fn get_game(&self, game_id: &GameId) -> Result<Game, CommerceError> {
        self.ledger.get_game(game_id)
    }

    pub fn list_games(&self, active_only: bool) -> Result<Vec<Game>, CommerceError> {
        self.ledger.list_games(active_only)
    }

    pub fn add_keys<I, S>(&self, game_id: &GameId, keys: I) -> Result<usize, CommerceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ledger.add_keys(game_id, keys)
    }

    pub fn count_unused_keys(&self, game_id: &GameId) -> Result<i64, CommerceError> {
        self.ledger.count_unused_keys(game_id)
    }

    // Cart

    pub fn get_cart(&self, user_id: &UserId) -> Result<CartView, CommerceError> {
        self.carts.get_cart(user_id)
    }

    pub fn add_item(
        &self,
        user_id: &UserId,
        game_id: &GameId,
        quantity: i64,
    ) -> Result<Cart, CommerceError> {
        self.carts.add_item(user_id, game_id, quantity)
    }

    pub fn update_quantity(
        &self,
        user_id: &UserId,
        game_id: &GameId,
        quantity: i64,
    ) -> Result<Cart, CommerceError> {
        self.carts.update_quantity(user_id, game_id, quantity)
    }

    pub fn remove_item(&self, user_id: &UserId, game_id: &GameId) -> Result<Cart, CommerceError> {
        self.carts.remove_item(user_id, game_id)
    }

    pub fn clear_cart(&self, user_id: &UserId) -> Result<(), CommerceError> {
        self.carts.clear(user_id)
    }

    pub fn grant_free_item(&self, user_id: &UserId, game_id: &GameId) -> Result<Cart, CommerceError> {
        self.carts.grant_free_item(user_id, game_id)
    }

    pub fn apply_promo(&self, user_id: &UserId, code: &str) -> Result<PromoQuote, CommerceError> {
        self.carts.apply_promo(user_id, code)
    }

    pub fn remove_promo(&self, user_id: &UserId) -> Result<Cart, CommerceError> {
        self.carts.remove_promo(user_id)
    }

    // Promos

    pub fn validate_promo(&self, code: &str, cart_total: Money) -> Result<PromoQuote, CommerceError> {
        self.promos.validate(code, cart_total)
    }

    pub fn create_promo(&self, input: NewPromo) -> Result<Promo, CommerceError> {
        self.promos.create_promo(input)
    }

    pub fn set_promo_active(&self, code: &str, active: bool) -> Result<Promo, CommerceError> {
        self.promos.set_active(code, active)
    }

    pub fn get_promo(&self, code: &str) -> Result<Promo, CommerceError> {
        self.promos.get_promo(code)
    }

    pub fn list_promos(&self) -> Result<Vec<Promo>, CommerceError> {
        self.promos.list_promos()
    }

    // Checkout and orders

    pub fn checkout(
        &self,
        user_id: &UserId,
        payment_method: PaymentMethod,
        promo_code: Option<&str>,
    ) -> Result<OrderSummary, CommerceError> {
        self.checkout.checkout(user_id, payment_method, promo_code)
    }

    /// Payment-callback entry point.
    pub fn confirm_payment(
        &self,
        order_id: &OrderId,
        payment_id: &str,
    ) -> Result<FulfillmentResult, CommerceError> {
        self.checkout.confirm_payment(order_id, payment_id)
    }

    pub fn fail_payment(&self, order_id: &OrderId, reason: &str) -> Result<Order, CommerceError> {
        self.checkout.fail_payment(order_id, reason)
    }

    pub fn refund_order(&self, order_id: &OrderId) -> Result<Order, CommerceError> {
        self.checkout.refund_order(order_id)
    }

    pub fn get_user_orders(&self, user_id: &UserId) -> Result<Vec<Order>, CommerceError> {
        self.checkout.get_user_orders(user_id)
    }

    pub fn get_order_by_id(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
    ) -> Result<Order, CommerceError> {
        self.checkout.get_order(order_id, user_id)
    }

    pub fn get_all_orders(&self) -> Result<Vec<Order>, CommerceError> {
        self.checkout.get_all_orders()
    }

    // Reporting

    pub fn get_analytics(&self) -> Result<Analytics, CommerceError> {
        self.reporting.analytics()
    }

    pub fn get_promo_stats(&self) -> Result<PromoStats, CommerceError> {
        self.reporting.promo_stats()
    }

    pub fn best_sellers(&self, limit: usize) -> Result<Vec<BestSeller>, CommerceError> {
        self.reporting.best_sellers(limit)
    }
}
