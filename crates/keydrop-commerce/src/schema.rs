//! SQLite schema.
//!
//! Cart items, order items and delivered keys live in JSON columns: they are
//! value objects owned by their cart or order and have no identity of their
//! own.

use keydrop_db::{Db, DbError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS games (
    id            TEXT PRIMARY KEY,
    title         TEXT NOT NULL,
    image_url     TEXT,
    base_price    INTEGER NOT NULL CHECK (base_price >= 0),
    discount      INTEGER NOT NULL DEFAULT 0,
    discount_kind TEXT NOT NULL DEFAULT 'PERCENTAGE',
    final_price   INTEGER NOT NULL CHECK (final_price >= 0),
    stock         INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
    active        INTEGER NOT NULL DEFAULT 1,
    created_at    INTEGER NOT NULL,
    updated_at    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS activation_keys (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    id         TEXT NOT NULL UNIQUE,
    game_id    TEXT NOT NULL REFERENCES games(id),
    key_code   TEXT NOT NULL UNIQUE,
    used       INTEGER NOT NULL DEFAULT 0,
    order_id   TEXT,
    created_at INTEGER NOT NULL,
    used_at    INTEGER,
    CHECK ((used = 0 AND order_id IS NULL) OR (used = 1 AND order_id IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_activation_keys_unused
    ON activation_keys (game_id, used, created_at, seq);

CREATE TABLE IF NOT EXISTS carts (
    id         TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL UNIQUE,
    items      TEXT NOT NULL DEFAULT '[]',
    promo_code TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS promos (
    id               TEXT PRIMARY KEY,
    code             TEXT NOT NULL UNIQUE,
    discount_percent INTEGER NOT NULL,
    max_discount     INTEGER,
    min_purchase     INTEGER NOT NULL DEFAULT 0,
    used_count       INTEGER NOT NULL DEFAULT 0,
    max_usage        INTEGER NOT NULL,
    active           INTEGER NOT NULL DEFAULT 1,
    expires_at       INTEGER,
    created_at       INTEGER NOT NULL,
    updated_at       INTEGER NOT NULL,
    CHECK (used_count <= max_usage)
);

CREATE TABLE IF NOT EXISTS orders (
    id              TEXT PRIMARY KEY,
    order_number    TEXT NOT NULL,
    user_id         TEXT NOT NULL,
    items           TEXT NOT NULL,
    subtotal        INTEGER NOT NULL,
    discount_amount INTEGER NOT NULL DEFAULT 0,
    promo_code      TEXT,
    total_price     INTEGER NOT NULL,
    status          TEXT NOT NULL DEFAULT 'PENDING',
    payment_method  TEXT NOT NULL,
    payment_id      TEXT,
    delivered_keys  TEXT,
    failure_reason  TEXT,
    created_at      INTEGER NOT NULL,
    updated_at      INTEGER NOT NULL,
    paid_at         INTEGER
);

CREATE INDEX IF NOT EXISTS idx_orders_user ON orders (user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_orders_number ON orders (order_number);
CREATE INDEX IF NOT EXISTS idx_orders_status ON orders (status);
"#;

/// Create all tables and indexes. Safe to run on every start.
pub fn migrate(db: &Db) -> Result<(), DbError> {
    db.execute_batch(SCHEMA)?;
    tracing::debug!("schema up to date");
    Ok(())
}
