//! Checkout and payment confirmation.

use super::order::{
    generate_order_number, DeliveredKey, FulfillmentResult, Order, OrderItem, OrderStatus,
    OrderSummary, PaymentMethod,
};
use crate::cart::{clear_cart, load_cart};
use crate::catalog::{claim_next_key, decrement_stock, require_game};
use crate::config::ShopConfig;
use crate::error::{CommerceError, ErrorKind};
use crate::ids::{OrderId, UserId};
use crate::money::Money;
use crate::promo::{mark_used_with, validate_with, PromoQuote};
use chrono::Utc;
use keydrop_db::{params, Db, Executor, Tx};
use serde::Deserialize;
use tracing::{info, warn};

const ORDER_COLUMNS: &str = "id, order_number, user_id, items, subtotal, discount_amount, \
                             promo_code, total_price, status, payment_method, payment_id, \
                             delivered_keys, failure_reason, created_at, updated_at, paid_at";

/// Order row as stored; items and delivered keys are JSON documents.
#[derive(Debug, Deserialize)]
struct OrderRecord {
    id: OrderId,
    order_number: String,
    user_id: UserId,
    #[serde(deserialize_with = "keydrop_db::columns::json")]
    items: Vec<OrderItem>,
    subtotal: Money,
    discount_amount: Money,
    promo_code: Option<String>,
    total_price: Money,
    status: OrderStatus,
    payment_method: PaymentMethod,
    payment_id: Option<String>,
    #[serde(default, deserialize_with = "keydrop_db::columns::json_option")]
    delivered_keys: Option<Vec<DeliveredKey>>,
    failure_reason: Option<String>,
    created_at: i64,
    updated_at: i64,
    paid_at: Option<i64>,
}

impl From<OrderRecord> for Order {
    fn from(r: OrderRecord) -> Self {
        Order {
            id: r.id,
            order_number: r.order_number,
            user_id: r.user_id,
            items: r.items,
            subtotal: r.subtotal,
            discount_amount: r.discount_amount,
            promo_code: r.promo_code,
            total_price: r.total_price,
            status: r.status,
            payment_method: r.payment_method,
            payment_id: r.payment_id,
            delivered_keys: r.delivered_keys,
            failure_reason: r.failure_reason,
            created_at: r.created_at,
            updated_at: r.updated_at,
            paid_at: r.paid_at,
        }
    }
}

/// Checkout and fulfillment pipeline.
#[derive(Debug, Clone)]
pub struct Checkout {
    db: Db,
    order_number_prefix: String,
}

impl Checkout {
    pub fn new(db: Db, config: &ShopConfig) -> Self {
        Self {
            db,
            order_number_prefix: config.order_number_prefix.clone(),
        }
    }

    /// Turn the user's cart into a `PENDING` order and empty the cart.
    ///
    /// `promo_code` takes precedence over a promo applied to the cart. A
    /// promo that fails validation, or whose last redemption is taken by a
    /// concurrent checkout, is dropped and the order proceeds at full price.
    pub fn checkout(
        &self,
        user_id: &UserId,
        payment_method: PaymentMethod,
        promo_code: Option<&str>,
    ) -> Result<OrderSummary, CommerceError> {
        let now = Utc::now();

        let order = self.db.transaction(|tx| {
            let cart = match load_cart(tx, user_id)? {
                Some(cart) if !cart.is_empty() => cart,
                _ => return Err(CommerceError::EmptyCart),
            };
            let subtotal = cart.subtotal()?;

            let code = promo_code
                .map(str::to_string)
                .or_else(|| cart.promo_code.clone());
            let quote = match code {
                Some(code) => redeem_promo(tx, user_id, &code, subtotal, now.timestamp())?,
                None => None,
            };
            let discount_amount = quote
                .as_ref()
                .map(|q| q.discount_amount)
                .unwrap_or_else(Money::zero);

            let mut items = Vec::with_capacity(cart.items.len());
            for line in &cart.items {
                let game = require_game(tx, &line.game_id)?;
                items.push(OrderItem {
                    game_id: line.game_id.clone(),
                    title: game.title,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    is_free: line.is_free,
                });
            }

            let order = Order {
                id: OrderId::generate(),
                order_number: generate_order_number(&self.order_number_prefix, now),
                user_id: user_id.clone(),
                items,
                subtotal,
                discount_amount,
                promo_code: quote.map(|q| q.code),
                total_price: subtotal.saturating_sub_floor(discount_amount),
                status: OrderStatus::Pending,
                payment_method,
                payment_id: None,
                delivered_keys: None,
                failure_reason: None,
                created_at: now.timestamp(),
                updated_at: now.timestamp(),
                paid_at: None,
            };
            insert_order(tx, &order)?;
            clear_cart(tx, user_id)?;
            Ok(order)
        })?;

        info!(
            user_id = %user_id,
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total_price,
            units = order.units(),
            "order placed"
        );
        Ok(OrderSummary::from(&order))
    }

    /// Fulfill a `PENDING` order after the provider confirms payment.
    ///
    /// Each purchased unit claims the oldest unused key of its game. Units
    /// with no key left are skipped, so the result may be partial. Key
    /// binding, stock decrement and the status change commit together, and a
    /// second confirmation of the same order fails with
    /// [`CommerceError::NotPending`] without touching any key.
    pub fn confirm_payment(
        &self,
        order_id: &OrderId,
        payment_id: &str,
    ) -> Result<FulfillmentResult, CommerceError> {
        let result = self.db.transaction(|tx| {
            let order = require_order(tx, order_id)?;
            if order.status != OrderStatus::Pending {
                return Err(CommerceError::NotPending {
                    order_id: order_id.to_string(),
                    status: order.status,
                });
            }

            let mut delivered = Vec::new();
            for item in &order.items {
                let mut claimed = 0;
                for _ in 0..item.quantity {
                    match claim_next_key(tx, &item.game_id, &order.id)? {
                        Some(key) => {
                            delivered.push(DeliveredKey {
                                game_id: item.game_id.clone(),
                                game_title: item.title.clone(),
                                key: key.key_code,
                            });
                            claimed += 1;
                        }
                        None => break,
                    }
                }
                if claimed > 0 {
                    decrement_stock(tx, &item.game_id, claimed)?;
                }
                if claimed < item.quantity {
                    warn!(
                        order_id = %order.id,
                        game_id = %item.game_id,
                        units = item.quantity,
                        keys_delivered = claimed,
                        "not enough keys, units left undelivered"
                    );
                }
            }

            let now = Utc::now().timestamp();
            let changed = tx.execute(
                "UPDATE orders SET status = ?, payment_id = ?, delivered_keys = ?, \
                 paid_at = ?, updated_at = ? WHERE id = ? AND status = ?",
                params![
                    OrderStatus::Paid.as_str(),
                    payment_id,
                    serde_json::to_string(&delivered)?,
                    now,
                    now,
                    order_id,
                    OrderStatus::Pending.as_str(),
                ],
            )?;
            if changed == 0 {
                return Err(CommerceError::NotPending {
                    order_id: order_id.to_string(),
                    status: order.status,
                });
            }

            let units = order.units();
            let message = if (delivered.len() as i64) < units {
                format!(
                    "Payment confirmed; delivered {} of {} keys",
                    delivered.len(),
                    units
                )
            } else {
                format!("Payment confirmed; {} keys delivered", delivered.len())
            };

            Ok(FulfillmentResult {
                order_id: order.id,
                order_number: order.order_number,
                message,
                keys_delivered: delivered.len(),
                units_purchased: units,
                delivered_keys: delivered,
            })
        })?;

        info!(
            order_id = %result.order_id,
            order_number = %result.order_number,
            keys_delivered = result.keys_delivered,
            units = result.units_purchased,
            "payment confirmed"
        );
        Ok(result)
    }

    /// Record that the provider refused payment (`PENDING → FAILED`).
    pub fn fail_payment(&self, order_id: &OrderId, reason: &str) -> Result<Order, CommerceError> {
        let order = self.db.transaction(|tx| {
            let mut order = require_order(tx, order_id)?;
            let from = order.status;
            order.transition(OrderStatus::Failed)?;
            order.failure_reason = Some(reason.to_string());
            write_status(tx, &mut order, from)?;
            Ok::<_, CommerceError>(order)
        })?;

        info!(order_id = %order.id, reason = %reason, "payment failed");
        Ok(order)
    }

    /// Mark a paid order refunded (`PAID → REFUNDED`). Delivered keys stay
    /// bound to the order.
    pub fn refund_order(&self, order_id: &OrderId) -> Result<Order, CommerceError> {
        let order = self.db.transaction(|tx| {
            let mut order = require_order(tx, order_id)?;
            let from = order.status;
            order.transition(OrderStatus::Refunded)?;
            write_status(tx, &mut order, from)?;
            Ok::<_, CommerceError>(order)
        })?;

        info!(order_id = %order.id, "order refunded");
        Ok(order)
    }

    /// A user's orders, newest first.
    pub fn get_user_orders(&self, user_id: &UserId) -> Result<Vec<Order>, CommerceError> {
        let records: Vec<OrderRecord> = self.db.query_as(
            &format!(
                "SELECT {} FROM orders WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
                ORDER_COLUMNS
            ),
            params![user_id],
        )?;
        Ok(records.into_iter().map(Order::from).collect())
    }

    /// One order, visible only to its owner.
    pub fn get_order(&self, order_id: &OrderId, user_id: &UserId) -> Result<Order, CommerceError> {
        match find_order(&self.db, order_id)? {
            Some(order) if &order.user_id == user_id => Ok(order),
            _ => Err(CommerceError::OrderNotFound(order_id.to_string())),
        }
    }

    /// Every order, newest first.
    pub fn get_all_orders(&self) -> Result<Vec<Order>, CommerceError> {
        let records: Vec<OrderRecord> = self.db.query_as(
            &format!(
                "SELECT {} FROM orders ORDER BY created_at DESC, rowid DESC",
                ORDER_COLUMNS
            ),
            params![],
        )?;
        Ok(records.into_iter().map(Order::from).collect())
    }
}

/// Validate and spend a promo for checkout.
///
/// Business-rule failures drop the promo (`Ok(None)`); storage failures
/// abort the checkout.
fn redeem_promo(
    tx: &Tx<'_>,
    user_id: &UserId,
    code: &str,
    subtotal: Money,
    now: i64,
) -> Result<Option<PromoQuote>, CommerceError> {
    let redeemed = validate_with(tx, code, subtotal, now)
        .and_then(|quote| mark_used_with(tx, &quote.promo_id).map(|()| quote));

    match redeemed {
        Ok(quote) => Ok(Some(quote)),
        Err(e) if e.kind() == ErrorKind::Internal => Err(e),
        Err(e) => {
            warn!(user_id = %user_id, promo_code = %code, error = %e, "promo ignored at checkout");
            Ok(None)
        }
    }
}

fn insert_order<E: Executor>(exec: &E, order: &Order) -> Result<(), CommerceError> {
    let delivered_keys = order
        .delivered_keys
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    exec.execute(
        &format!(
            "INSERT INTO orders ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            ORDER_COLUMNS
        ),
        params![
            &order.id,
            &order.order_number,
            &order.user_id,
            serde_json::to_string(&order.items)?,
            order.subtotal,
            order.discount_amount,
            order.promo_code.clone(),
            order.total_price,
            order.status.as_str(),
            &order.payment_method,
            order.payment_id.clone(),
            delivered_keys,
            order.failure_reason.clone(),
            order.created_at,
            order.updated_at,
            order.paid_at,
        ],
    )?;
    Ok(())
}

/// Persist a status change, conditional on the row still being in `from`.
fn write_status<E: Executor>(
    exec: &E,
    order: &mut Order,
    from: OrderStatus,
) -> Result<(), CommerceError> {
    order.updated_at = Utc::now().timestamp();
    let changed = exec.execute(
        "UPDATE orders SET status = ?, failure_reason = ?, updated_at = ? \
         WHERE id = ? AND status = ?",
        params![
            order.status.as_str(),
            order.failure_reason.clone(),
            order.updated_at,
            &order.id,
            from.as_str(),
        ],
    )?;
    if changed == 0 {
        return Err(CommerceError::InvalidTransition {
            from,
            to: order.status,
        });
    }
    Ok(())
}

fn find_order<E: Executor>(exec: &E, order_id: &OrderId) -> Result<Option<Order>, CommerceError> {
    let record: Option<OrderRecord> = exec.query_optional(
        &format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS),
        params![order_id],
    )?;
    Ok(record.map(Order::from))
}

fn require_order<E: Executor>(exec: &E, order_id: &OrderId) -> Result<Order, CommerceError> {
    find_order(exec, order_id)?.ok_or_else(|| CommerceError::OrderNotFound(order_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartService;
    use crate::catalog::{NewGame, StockLedger};
    use crate::ids::GameId;
    use crate::promo::{NewPromo, PromoEngine};
    use crate::schema;

    struct Fixture {
        ledger: StockLedger,
        promos: PromoEngine,
        carts: CartService,
        checkout: Checkout,
    }

    fn fixture() -> Fixture {
        let db = Db::open_in_memory().unwrap();
        schema::migrate(&db).unwrap();
        let config = ShopConfig::default();
        Fixture {
            ledger: StockLedger::new(db.clone()),
            promos: PromoEngine::new(db.clone()),
            carts: CartService::new(db.clone(), &config),
            checkout: Checkout::new(db, &config),
        }
    }

    fn game_with_keys(f: &Fixture, title: &str, price: i64, keys: &[&str]) -> GameId {
        let game = f
            .ledger
            .create_game(NewGame::new(title, Money::new(price)))
            .unwrap();
        f.ledger.add_keys(&game.id, keys.iter().copied()).unwrap();
        game.id
    }

    #[test]
    fn test_checkout_creates_pending_order_and_empties_cart() {
        let f = fixture();
        let user = UserId::new("alice");
        let game = game_with_keys(&f, "Celeste", 50_000, &["C-1", "C-2"]);
        f.carts.add_item(&user, &game, 2).unwrap();

        let summary = f
            .checkout
            .checkout(&user, PaymentMethod::BankTransfer, None)
            .unwrap();
        assert_eq!(summary.status, OrderStatus::Pending);
        assert_eq!(summary.total_price, Money::new(100_000));
        assert!(summary.order_number.starts_with("ORD-"));
        assert!(f.carts.get_cart(&user).unwrap().items.is_empty());

        let order = f.checkout.get_order(&summary.order_id, &user).unwrap();
        assert_eq!(order.items[0].title, "Celeste");
        assert!(order.delivered_keys.is_none());
    }

    #[test]
    fn test_checkout_empty_cart() {
        let f = fixture();
        let user = UserId::new("alice");
        assert!(matches!(
            f.checkout.checkout(&user, PaymentMethod::EWallet, None),
            Err(CommerceError::EmptyCart)
        ));
        f.carts.get_cart(&user).unwrap();
        assert!(matches!(
            f.checkout.checkout(&user, PaymentMethod::EWallet, None),
            Err(CommerceError::EmptyCart)
        ));
        assert!(f.checkout.get_all_orders().unwrap().is_empty());
    }

    #[test]
    fn test_checkout_redeems_promo() {
        let f = fixture();
        let user = UserId::new("alice");
        let game = game_with_keys(&f, "Celeste", 100_000, &["C-1"]);
        f.promos.create_promo(NewPromo::percentage("SAVE10", 10, 5)).unwrap();
        f.carts.add_item(&user, &game, 1).unwrap();

        let summary = f
            .checkout
            .checkout(&user, PaymentMethod::CreditCard, Some("save10"))
            .unwrap();
        assert_eq!(summary.discount_amount, Money::new(10_000));
        assert_eq!(summary.total_price, Money::new(90_000));
        assert_eq!(summary.promo_code.as_deref(), Some("SAVE10"));
        assert_eq!(f.promos.get_promo("SAVE10").unwrap().used_count, 1);
    }

    #[test]
    fn test_checkout_ignores_bad_promo() {
        let f = fixture();
        let user = UserId::new("alice");
        let game = game_with_keys(&f, "Celeste", 100_000, &["C-1"]);
        f.carts.add_item(&user, &game, 1).unwrap();

        let summary = f
            .checkout
            .checkout(&user, PaymentMethod::CreditCard, Some("BOGUS"))
            .unwrap();
        assert_eq!(summary.discount_amount, Money::zero());
        assert_eq!(summary.total_price, Money::new(100_000));
        assert!(summary.promo_code.is_none());
    }

    #[test]
    fn test_confirm_payment_delivers_fifo() {
        let f = fixture();
        let user = UserId::new("alice");
        let game = game_with_keys(&f, "Celeste", 1_000, &["C-1", "C-2", "C-3"]);
        f.carts.add_item(&user, &game, 2).unwrap();
        let summary = f
            .checkout
            .checkout(&user, PaymentMethod::BankTransfer, None)
            .unwrap();

        let result = f.checkout.confirm_payment(&summary.order_id, "pay_1").unwrap();
        assert_eq!(result.keys_delivered, 2);
        assert!(!result.is_partial());
        let keys: Vec<&str> = result.delivered_keys.iter().map(|k| k.key.as_str()).collect();
        assert_eq!(keys, vec!["C-1", "C-2"]);

        let order = f.checkout.get_order(&summary.order_id, &user).unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.payment_id.as_deref(), Some("pay_1"));
        assert_eq!(order.keys_delivered(), 2);
        assert!(order.paid_at.is_some());
        assert_eq!(f.ledger.get_game(&game).unwrap().stock, 1);
        assert_eq!(f.ledger.count_unused_keys(&game).unwrap(), 1);
    }

    #[test]
    fn test_confirm_unknown_order() {
        let f = fixture();
        assert!(matches!(
            f.checkout.confirm_payment(&OrderId::new("ord_missing"), "pay"),
            Err(CommerceError::OrderNotFound(_))
        ));
    }

    #[test]
    fn test_fail_then_confirm_rejected() {
        let f = fixture();
        let user = UserId::new("alice");
        let game = game_with_keys(&f, "Celeste", 1_000, &["C-1"]);
        f.carts.add_item(&user, &game, 1).unwrap();
        let summary = f
            .checkout
            .checkout(&user, PaymentMethod::BankTransfer, None)
            .unwrap();

        let order = f.checkout.fail_payment(&summary.order_id, "card declined").unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.failure_reason.as_deref(), Some("card declined"));

        assert!(matches!(
            f.checkout.confirm_payment(&summary.order_id, "pay_1"),
            Err(CommerceError::NotPending { status: OrderStatus::Failed, .. })
        ));
        assert_eq!(f.ledger.count_unused_keys(&game).unwrap(), 1);
    }

    #[test]
    fn test_refund_requires_paid() {
        let f = fixture();
        let user = UserId::new("alice");
        let game = game_with_keys(&f, "Celeste", 1_000, &["C-1"]);
        f.carts.add_item(&user, &game, 1).unwrap();
        let summary = f
            .checkout
            .checkout(&user, PaymentMethod::BankTransfer, None)
            .unwrap();

        assert!(matches!(
            f.checkout.refund_order(&summary.order_id),
            Err(CommerceError::InvalidTransition { from: OrderStatus::Pending, to: OrderStatus::Refunded })
        ));

        f.checkout.confirm_payment(&summary.order_id, "pay_1").unwrap();
        let order = f.checkout.refund_order(&summary.order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);
        assert_eq!(order.keys_delivered(), 1);
    }

    #[test]
    fn test_get_order_checks_owner() {
        let f = fixture();
        let alice = UserId::new("alice");
        let game = game_with_keys(&f, "Celeste", 1_000, &["C-1"]);
        f.carts.add_item(&alice, &game, 1).unwrap();
        let summary = f
            .checkout
            .checkout(&alice, PaymentMethod::BankTransfer, None)
            .unwrap();

        assert!(matches!(
            f.checkout.get_order(&summary.order_id, &UserId::new("mallory")),
            Err(CommerceError::OrderNotFound(_))
        ));
        assert_eq!(f.checkout.get_user_orders(&alice).unwrap().len(), 1);
        assert!(f.checkout.get_user_orders(&UserId::new("mallory")).unwrap().is_empty());
    }
}
