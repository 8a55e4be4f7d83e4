//! Promo redemption and reporting through the shop facade.

use keydrop_commerce::prelude::*;
use std::sync::Arc;
use std::thread;

fn shop() -> Shop {
    Shop::open_in_memory(ShopConfig::default()).unwrap()
}

#[test]
fn test_validate_save10() {
    let shop = shop();
    shop.create_promo(NewPromo::percentage("SAVE10", 10, 100))
        .unwrap();

    let quote = shop.validate_promo("save10", Money::new(100_000)).unwrap();
    assert_eq!(quote.code, "SAVE10");
    assert_eq!(quote.discount_amount, Money::new(10_000));
    assert_eq!(quote.final_total, Money::new(90_000));
}

#[test]
fn test_exhausted_promo_fails_for_any_total() {
    let shop = shop();
    let promo = shop
        .create_promo(NewPromo::percentage("ONCE", 25, 1))
        .unwrap();
    shop.promos().mark_used(&promo.id).unwrap();

    for total in [0, 10_000, 10_000_000] {
        let err = shop.validate_promo("ONCE", Money::new(total)).unwrap_err();
        assert!(matches!(err, CommerceError::PromoUsageLimitReached(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

#[test]
fn test_cart_promo_used_at_checkout() {
    let shop = shop();
    let user = UserId::new("alice");
    let game = shop
        .create_game(NewGame::new("Hades", Money::new(200_000)))
        .unwrap();
    shop.add_keys(&game.id, ["H-1"]).unwrap();
    shop.create_promo(
        NewPromo::percentage("HALF", 50, 10).with_max_discount(Money::new(30_000)),
    )
    .unwrap();

    shop.add_item(&user, &game.id, 1).unwrap();
    shop.apply_promo(&user, "half").unwrap();
    assert_eq!(shop.get_promo("HALF").unwrap().used_count, 0);

    let summary = shop
        .checkout(&user, PaymentMethod::CreditCard, None)
        .unwrap();
    assert_eq!(summary.discount_amount, Money::new(30_000));
    assert_eq!(summary.total_price, Money::new(170_000));
    assert_eq!(shop.get_promo("HALF").unwrap().used_count, 1);
    assert!(shop.get_cart(&user).unwrap().promo_code.is_none());
}

#[test]
fn test_concurrent_checkouts_respect_usage_limit() {
    const BUYERS: usize = 10;
    const MAX_USAGE: i64 = 3;

    let shop = Arc::new(shop());
    let game = shop
        .create_game(NewGame::new("Celeste", Money::new(100_000)))
        .unwrap();
    let keys: Vec<String> = (0..BUYERS).map(|i| format!("C-{}", i)).collect();
    shop.add_keys(&game.id, keys).unwrap();
    shop.create_promo(NewPromo::percentage("RUSH", 10, MAX_USAGE))
        .unwrap();

    let users: Vec<UserId> = (0..BUYERS).map(|i| UserId::new(format!("u{}", i))).collect();
    for user in &users {
        shop.add_item(user, &game.id, 1).unwrap();
    }

    let summaries: Vec<OrderSummary> = thread::scope(|s| {
        let handles: Vec<_> = users
            .iter()
            .map(|user| {
                let shop = Arc::clone(&shop);
                s.spawn(move || {
                    shop.checkout(user, PaymentMethod::EWallet, Some("RUSH"))
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let discounted = summaries
        .iter()
        .filter(|s| s.promo_code.is_some())
        .count();
    assert_eq!(discounted as i64, MAX_USAGE);
    assert!(summaries
        .iter()
        .filter(|s| s.promo_code.is_none())
        .all(|s| s.total_price == Money::new(100_000)));
    assert_eq!(shop.get_promo("RUSH").unwrap().used_count, MAX_USAGE);
}

#[test]
fn test_analytics_with_no_orders() {
    let shop = shop();
    let analytics = shop.get_analytics().unwrap();
    assert_eq!(analytics.total_orders, 0);
    assert_eq!(analytics.conversion_rate, 0.0);
}

#[test]
fn test_two_units_one_key_scenario() {
    let shop = shop();
    let user = UserId::new("alice");
    let game = shop
        .create_game(NewGame::new("Celeste", Money::new(50_000)))
        .unwrap();
    shop.add_keys(&game.id, ["ONLY-KEY"]).unwrap();

    // Cached stock gates add_item, so the second unit comes from a stale counter.
    shop.add_item(&user, &game.id, 1).unwrap();
    shop.db()
        .execute_batch("UPDATE games SET stock = 2")
        .unwrap();
    shop.add_item(&user, &game.id, 1).unwrap();

    let summary = shop
        .checkout(&user, PaymentMethod::BankTransfer, None)
        .unwrap();
    let result = shop.confirm_payment(&summary.order_id, "pay_1").unwrap();

    assert_eq!(result.keys_delivered, 1);
    assert_eq!(result.units_purchased, 2);
    assert_eq!(result.delivered_keys[0].key, "ONLY-KEY");
    let order = shop.get_order_by_id(&summary.order_id, &user).unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[test]
fn test_reporting_after_sales() {
    let shop = shop();
    let game = shop
        .create_game(NewGame::new("Celeste", Money::new(40_000)))
        .unwrap();
    shop.add_keys(&game.id, ["A", "B", "C"]).unwrap();
    shop.create_promo(NewPromo::percentage("TEN", 10, 5))
        .unwrap();

    let alice = UserId::new("alice");
    shop.add_item(&alice, &game.id, 2).unwrap();
    let paid = shop
        .checkout(&alice, PaymentMethod::BankTransfer, Some("TEN"))
        .unwrap();
    shop.confirm_payment(&paid.order_id, "pay_a").unwrap();

    let bob = UserId::new("bob");
    shop.add_item(&bob, &game.id, 1).unwrap();
    shop.checkout(&bob, PaymentMethod::BankTransfer, None)
        .unwrap();

    let analytics = shop.get_analytics().unwrap();
    assert_eq!(analytics.total_orders, 2);
    assert_eq!(analytics.paid_orders, 1);
    assert_eq!(analytics.pending_orders, 1);
    assert_eq!(analytics.total_revenue, Money::new(72_000));
    assert_eq!(analytics.conversion_rate, 50.0);

    let stats = shop.get_promo_stats().unwrap();
    assert_eq!(stats.total_promos, 1);
    assert_eq!(stats.active_promos, 1);
    assert_eq!(stats.total_usage, 1);

    let top = shop.best_sellers(5).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].keys_delivered, 2);
    assert_eq!(top[0].title, "Celeste");
}
