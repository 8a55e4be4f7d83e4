//! Read-only aggregates over orders and promos.

use crate::error::CommerceError;
use crate::ids::GameId;
use crate::money::Money;
use keydrop_db::{params, Db, Executor};
use serde::{Deserialize, Serialize};

/// Order funnel figures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Analytics {
    pub total_orders: i64,
    pub paid_orders: i64,
    pub pending_orders: i64,
    /// Sum of `total_price` over paid orders.
    pub total_revenue: Money,
    /// `paid_orders / total_orders * 100`, zero when there are no orders.
    pub conversion_rate: f64,
}

/// Promo usage figures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromoStats {
    pub total_promos: i64,
    pub active_promos: i64,
    /// Sum of `used_count` over all promos.
    pub total_usage: i64,
}

/// Keys delivered for one game across paid orders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BestSeller {
    pub game_id: GameId,
    pub title: String,
    pub keys_delivered: i64,
}

/// Reporting facade. Holds no state of its own.
#[derive(Debug, Clone)]
pub struct Reporting {
    db: Db,
}

impl Reporting {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn analytics(&self) -> Result<Analytics, CommerceError> {
        let total_orders = self.db.query_i64("SELECT COUNT(*) FROM orders", params![])?;
        let paid_orders = self.db.query_i64(
            "SELECT COUNT(*) FROM orders WHERE status = 'PAID'",
            params![],
        )?;
        let pending_orders = self.db.query_i64(
            "SELECT COUNT(*) FROM orders WHERE status = 'PENDING'",
            params![],
        )?;
        let total_revenue = self.db.query_i64(
            "SELECT SUM(total_price) FROM orders WHERE status = 'PAID'",
            params![],
        )?;

        Ok(Analytics {
            total_orders,
            paid_orders,
            pending_orders,
            total_revenue: Money::new(total_revenue),
            conversion_rate: conversion_rate(paid_orders, total_orders),
        })
    }

    pub fn promo_stats(&self) -> Result<PromoStats, CommerceError> {
        Ok(PromoStats {
            total_promos: self.db.query_i64("SELECT COUNT(*) FROM promos", params![])?,
            active_promos: self
                .db
                .query_i64("SELECT COUNT(*) FROM promos WHERE active = 1", params![])?,
            total_usage: self
                .db
                .query_i64("SELECT SUM(used_count) FROM promos", params![])?,
        })
    }

    /// Games ranked by keys delivered on paid orders.
    pub fn best_sellers(&self, limit: usize) -> Result<Vec<BestSeller>, CommerceError> {
        Ok(self.db.query_as(
            "SELECT json_extract(k.value, '$.game_id') AS game_id, \
                    MAX(json_extract(k.value, '$.game_title')) AS title, \
                    COUNT(*) AS keys_delivered \
             FROM orders o, json_each(o.delivered_keys) k \
             WHERE o.status = 'PAID' AND o.delivered_keys IS NOT NULL \
             GROUP BY json_extract(k.value, '$.game_id') \
             ORDER BY keys_delivered DESC, title ASC \
             LIMIT ?",
            params![i64::try_from(limit).unwrap_or(i64::MAX)],
        )?)
    }
}

fn conversion_rate(paid: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    paid as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    fn reporting() -> Reporting {
        let db = Db::open_in_memory().unwrap();
        schema::migrate(&db).unwrap();
        Reporting::new(db)
    }

    fn insert_order(r: &Reporting, id: &str, status: &str, total: i64, keys: Option<&str>) {
        r.db.execute(
            "INSERT INTO orders (id, order_number, user_id, items, subtotal, total_price, \
             status, payment_method, delivered_keys, created_at, updated_at) \
             VALUES (?, ?, 'u', '[]', ?, ?, ?, 'bank_transfer', ?, 0, 0)",
            params![id, id, total, total, status, keys],
        )
        .unwrap();
    }

    #[test]
    fn test_empty_store() {
        let r = reporting();
        let a = r.analytics().unwrap();
        assert_eq!(a.total_orders, 0);
        assert_eq!(a.total_revenue, Money::zero());
        assert_eq!(a.conversion_rate, 0.0);
        assert!(!a.conversion_rate.is_nan());

        let p = r.promo_stats().unwrap();
        assert_eq!(p, PromoStats { total_promos: 0, active_promos: 0, total_usage: 0 });
        assert!(r.best_sellers(5).unwrap().is_empty());
    }

    #[test]
    fn test_revenue_counts_paid_only() {
        let r = reporting();
        insert_order(&r, "o1", "PAID", 100, Some("[]"));
        insert_order(&r, "o2", "PENDING", 200, None);
        insert_order(&r, "o3", "FAILED", 400, None);
        insert_order(&r, "o4", "PAID", 50, Some("[]"));

        let a = r.analytics().unwrap();
        assert_eq!(a.total_orders, 4);
        assert_eq!(a.paid_orders, 2);
        assert_eq!(a.pending_orders, 1);
        assert_eq!(a.total_revenue, Money::new(150));
        assert_eq!(a.conversion_rate, 50.0);
    }

    #[test]
    fn test_best_sellers() {
        let r = reporting();
        insert_order(
            &r,
            "o1",
            "PAID",
            1,
            Some(r#"[{"game_id":"g1","game_title":"Celeste","key":"A"},{"game_id":"g2","game_title":"Hades","key":"B"}]"#),
        );
        insert_order(
            &r,
            "o2",
            "PAID",
            1,
            Some(r#"[{"game_id":"g2","game_title":"Hades","key":"C"}]"#),
        );
        insert_order(
            &r,
            "o3",
            "REFUNDED",
            1,
            Some(r#"[{"game_id":"g1","game_title":"Celeste","key":"D"}]"#),
        );

        let top = r.best_sellers(10).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].game_id, GameId::new("g2"));
        assert_eq!(top[0].keys_delivered, 2);
        assert_eq!(top[1].title, "Celeste");
        assert_eq!(r.best_sellers(1).unwrap().len(), 1);
    }

    #[test]
    fn test_conversion_rate() {
        assert_eq!(conversion_rate(0, 0), 0.0);
        assert_eq!(conversion_rate(1, 4), 25.0);
    }
}
