//! End-to-end checkout and fulfillment behaviour.

use keydrop_commerce::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

fn shop() -> Shop {
    Shop::open_in_memory(ShopConfig::default()).unwrap()
}

fn game_with_keys(shop: &Shop, title: &str, price: i64, keys: usize) -> GameId {
    let game = shop
        .create_game(NewGame::new(title, Money::new(price)))
        .unwrap();
    let codes: Vec<String> = (0..keys).map(|i| format!("{}-KEY-{:04}", title, i)).collect();
    shop.add_keys(&game.id, codes).unwrap();
    game.id
}

fn place_order(shop: &Shop, user: &str, game: &GameId, quantity: i64) -> OrderId {
    let user = UserId::new(user);
    shop.add_item(&user, game, quantity).unwrap();
    shop.checkout(&user, PaymentMethod::BankTransfer, None)
        .unwrap()
        .order_id
}

#[test]
fn test_subtotal_and_cart_emptied_after_checkout() {
    let shop = shop();
    let user = UserId::new("alice");
    let a = game_with_keys(&shop, "Celeste", 75_000, 5);
    let b = game_with_keys(&shop, "Hades", 120_000, 5);

    shop.add_item(&user, &a, 2).unwrap();
    shop.add_item(&user, &b, 1).unwrap();
    shop.add_item(&user, &a, 1).unwrap();

    let view = shop.get_cart(&user).unwrap();
    let expected: i64 = view
        .items
        .iter()
        .map(|line| line.unit_price.amount() * line.quantity)
        .sum();
    assert_eq!(view.subtotal, Money::new(expected));
    assert_eq!(view.subtotal, Money::new(3 * 75_000 + 120_000));
    assert_eq!(view.item_count, 4);

    let summary = shop
        .checkout(&user, PaymentMethod::EWallet, None)
        .unwrap();
    assert_eq!(summary.subtotal, view.subtotal);
    assert_eq!(summary.total_price, view.subtotal);

    let after = shop.get_cart(&user).unwrap();
    assert!(after.items.is_empty());
    assert_eq!(after.cart_id, view.cart_id);
}

#[test]
fn test_empty_cart_checkout_creates_no_order() {
    let shop = shop();
    let user = UserId::new("alice");
    let err = shop
        .checkout(&user, PaymentMethod::BankTransfer, None)
        .unwrap_err();
    assert!(matches!(err, CommerceError::EmptyCart));
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(shop.get_all_orders().unwrap().is_empty());
}

#[test]
fn test_order_snapshot_survives_repricing() {
    let shop = shop();
    let user = UserId::new("alice");
    let game = game_with_keys(&shop, "Celeste", 100_000, 1);
    let order_id = place_order(&shop, "alice", &game, 1);

    shop.update_game_pricing(
        &game,
        PricingUpdate {
            base_price: Some(Money::new(10)),
            ..Default::default()
        },
    )
    .unwrap();

    let order = shop.get_order_by_id(&order_id, &user).unwrap();
    assert_eq!(order.items[0].unit_price, Money::new(100_000));
    assert_eq!(order.total_price, Money::new(100_000));
}

#[test]
fn test_double_confirmation_delivers_once() {
    let shop = shop();
    let game = game_with_keys(&shop, "Celeste", 1_000, 3);
    let order_id = place_order(&shop, "alice", &game, 1);

    let first = shop.confirm_payment(&order_id, "pay_1").unwrap();
    assert_eq!(first.keys_delivered, 1);

    let err = shop.confirm_payment(&order_id, "pay_1_retry").unwrap_err();
    assert!(matches!(
        err,
        CommerceError::NotPending {
            status: OrderStatus::Paid,
            ..
        }
    ));

    let order = shop
        .get_order_by_id(&order_id, &UserId::new("alice"))
        .unwrap();
    assert_eq!(order.delivered_keys.unwrap(), first.delivered_keys);
    assert_eq!(order.payment_id.as_deref(), Some("pay_1"));
    assert_eq!(shop.count_unused_keys(&game).unwrap(), 2);
}

#[test]
fn test_partial_delivery_when_keys_run_out() {
    let shop = shop();
    let game = game_with_keys(&shop, "Celeste", 1_000, 2);
    let order_id = place_order(&shop, "alice", &game, 2);

    // Another buyer's order takes one key first.
    let other = place_order(&shop, "bob", &game, 1);
    shop.confirm_payment(&other, "pay_bob").unwrap();

    let result = shop.confirm_payment(&order_id, "pay_alice").unwrap();
    assert_eq!(result.keys_delivered, 1);
    assert_eq!(result.units_purchased, 2);
    assert!(result.is_partial());

    let order = shop
        .get_order_by_id(&order_id, &UserId::new("alice"))
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.keys_delivered(), 1);
    assert_eq!(shop.get_game(&game).unwrap().stock, 0);
}

#[test]
fn test_concurrent_confirmations_never_share_keys() {
    const ORDERS: usize = 12;
    const KEYS: usize = 5;

    let shop = Arc::new(shop());
    let game = game_with_keys(&shop, "Celeste", 1_000, KEYS);
    let orders: Vec<OrderId> = (0..ORDERS)
        .map(|i| place_order(&shop, &format!("user-{}", i), &game, 1))
        .collect();

    let results: Vec<FulfillmentResult> = thread::scope(|s| {
        let handles: Vec<_> = orders
            .iter()
            .map(|order_id| {
                let shop = Arc::clone(&shop);
                s.spawn(move || shop.confirm_payment(order_id, "pay").unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let delivered: Vec<&str> = results
        .iter()
        .flat_map(|r| r.delivered_keys.iter().map(|k| k.key.as_str()))
        .collect();
    assert_eq!(delivered.len(), KEYS);
    let unique: HashSet<&str> = delivered.iter().copied().collect();
    assert_eq!(unique.len(), KEYS);

    assert_eq!(shop.count_unused_keys(&game).unwrap(), 0);
    assert_eq!(shop.get_game(&game).unwrap().stock, 0);
    assert_eq!(shop.get_analytics().unwrap().paid_orders, ORDERS as i64);
}

#[test]
fn test_concurrent_duplicate_webhooks_fulfill_once() {
    let shop = Arc::new(shop());
    let game = game_with_keys(&shop, "Celeste", 1_000, 10);
    let order_id = place_order(&shop, "alice", &game, 2);

    let outcomes: Vec<Result<FulfillmentResult, CommerceError>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shop = Arc::clone(&shop);
                let order_id = &order_id;
                s.spawn(move || shop.confirm_payment(order_id, "pay_dup"))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(outcomes
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, CommerceError::NotPending { .. })));
    assert_eq!(shop.count_unused_keys(&game).unwrap(), 8);
}

#[test]
fn test_separate_connections_share_key_pool() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keydrop.db");

    let shop_a = Shop::open(Db::open(&path).unwrap(), ShopConfig::default()).unwrap();
    let shop_b = Shop::open(Db::open(&path).unwrap(), ShopConfig::default()).unwrap();

    let game = game_with_keys(&shop_a, "Celeste", 1_000, 3);
    let orders: Vec<OrderId> = (0..6)
        .map(|i| place_order(&shop_a, &format!("user-{}", i), &game, 1))
        .collect();

    let results: Vec<FulfillmentResult> = thread::scope(|s| {
        let handles: Vec<_> = orders
            .iter()
            .enumerate()
            .map(|(i, order_id)| {
                let shop = if i % 2 == 0 { &shop_a } else { &shop_b };
                s.spawn(move || shop.confirm_payment(order_id, "pay").unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let keys: HashSet<String> = results
        .into_iter()
        .flat_map(|r| r.delivered_keys.into_iter().map(|k| k.key))
        .collect();
    assert_eq!(keys.len(), 3);
    assert_eq!(shop_b.count_unused_keys(&game).unwrap(), 0);
}
