//! Type-safe SQLite database layer for keydrop.
//!
//! Wraps a single SQLite connection with typed query results and
//! closure-scoped transactions. Rows deserialize through serde, so any
//! `Deserialize` struct whose field names match the selected columns can be
//! read back directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use keydrop_db::{params, Db, Executor};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Game {
//!     id: String,
//!     title: String,
//!     final_price: i64,
//! }
//!
//! let db = Db::open("keydrop.db")?;
//!
//! db.execute(
//!     "INSERT INTO games (id, title, final_price) VALUES (?, ?, ?)",
//!     params!["g1", "Hollow Knight", 120000],
//! )?;
//!
//! let games: Vec<Game> = db.query_as(
//!     "SELECT id, title, final_price FROM games WHERE final_price < ?",
//!     params![200000],
//! )?;
//!
//! // Everything inside the closure commits together or not at all.
//! db.transaction(|tx| {
//!     tx.execute("UPDATE games SET stock = stock - 1 WHERE id = ?", params!["g1"])?;
//!     Ok::<_, keydrop_db::DbError>(())
//! })?;
//! ```

pub mod columns;
mod db;
mod error;
mod types;

pub use db::{Db, Executor, Tx};
pub use error::DbError;
pub use types::{QueryResult, Row, Value};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{params, Db, DbError, Executor, QueryResult, Row, Tx, Value};
}

/// Create a parameter list for SQL queries.
///
/// # Example
///
/// ```rust,ignore
/// use keydrop_db::params;
///
/// let params = params!["value1", 42, 3.14];
/// ```
#[macro_export]
macro_rules! params {
    () => {
        &[]
    };
    ($($param:expr),+ $(,)?) => {
        &[$($crate::Value::from($param)),+]
    };
}
