//! Database connection and query execution.

use crate::{DbError, QueryResult, Row, Value};
use rusqlite::{Connection, TransactionBehavior};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How long a writer waits on a locked database file before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Anything that can run SQL: the shared [`Db`] handle or an open [`Tx`].
///
/// Store code is written against this trait so the same query can run
/// standalone or as one step of a larger transaction.
pub trait Executor {
    /// Execute a statement that doesn't return rows.
    ///
    /// Returns the number of rows changed, which is how conditional updates
    /// (`... WHERE used = 0`) report whether they won.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize, DbError>;

    /// Execute a query and return raw results.
    ///
    /// Also used for `UPDATE ... RETURNING` statements.
    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult, DbError>;

    /// Execute a query and deserialize results into a vector.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let games: Vec<Game> = db.query_as(
    ///     "SELECT id, title FROM games WHERE active = ?",
    ///     params![true],
    /// )?;
    /// ```
    fn query_as<T: DeserializeOwned>(&self, sql: &str, params: &[Value]) -> Result<Vec<T>, DbError> {
        self.query(sql, params)?.deserialize_all()
    }

    /// Execute a query and return a single row.
    ///
    /// Returns [`DbError::NotFound`] if no rows are returned.
    fn query_one<T: DeserializeOwned>(&self, sql: &str, params: &[Value]) -> Result<T, DbError> {
        let result = self.query(sql, params)?;
        result.first().ok_or(DbError::NotFound)?.deserialize()
    }

    /// Execute a query and return an optional single row.
    fn query_optional<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<T>, DbError> {
        let result = self.query(sql, params)?;
        match result.first() {
            Some(row) => Ok(Some(row.deserialize()?)),
            None => Ok(None),
        }
    }

    /// Execute a query and return the first column of the first row as an integer.
    ///
    /// `NULL` (e.g. `SUM` over no rows) reads as zero.
    fn query_i64(&self, sql: &str, params: &[Value]) -> Result<i64, DbError> {
        let result = self.query(sql, params)?;
        let value = result
            .first()
            .and_then(|row| row.get_index(0))
            .ok_or(DbError::NotFound)?;
        match value {
            Value::Null => Ok(0),
            other => other
                .as_integer()
                .ok_or_else(|| DbError::TypeError(format!("expected integer, got {:?}", other))),
        }
    }
}

/// SQLite database handle.
///
/// Cheap to clone; all clones share one connection behind a mutex, so
/// statements and transactions from different threads are serialized.
#[derive(Debug, Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Open (or create) a database file.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let db = Db::open("keydrop.db")?;
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| DbError::OpenError(e.to_string()))?;
        tracing::debug!(path = %path.display(), "opened database");
        Self::configure(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().map_err(|e| DbError::OpenError(e.to_string()))?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self, DbError> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| DbError::OpenError(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| DbError::OpenError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    /// Execute several `;`-separated statements, e.g. a schema script.
    pub fn execute_batch(&self, sql: &str) -> Result<(), DbError> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    /// Run `f` inside a transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and rolls back otherwise,
    /// so every statement issued through the [`Tx`] lands together or not at
    /// all. The connection stays locked for the duration of the closure.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let moved = db.transaction(|tx| {
    ///     let n = tx.execute("UPDATE keys SET used = 1 WHERE id = ? AND used = 0", params![id])?;
    ///     tx.execute("UPDATE games SET stock = MAX(0, stock - ?) WHERE id = ?", params![n as i64, game])?;
    ///     Ok::<_, DbError>(n)
    /// })?;
    /// ```
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Tx<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut conn = self.lock()?;
        let inner = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DbError::from)?;
        let tx = Tx { inner };

        match f(&tx) {
            Ok(value) => {
                tx.inner.commit().map_err(DbError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.inner.rollback() {
                    tracing::warn!(error = %rollback, "transaction rollback failed");
                }
                Err(e)
            }
        }
    }
}

impl Executor for Db {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize, DbError> {
        let conn = self.lock()?;
        run_execute(&conn, sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult, DbError> {
        let conn = self.lock()?;
        run_query(&conn, sql, params)
    }
}

/// An open transaction, handed to the closure passed to [`Db::transaction`].
pub struct Tx<'c> {
    inner: rusqlite::Transaction<'c>,
}

impl Executor for Tx<'_> {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize, DbError> {
        run_execute(&self.inner, sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult, DbError> {
        run_query(&self.inner, sql, params)
    }
}

fn run_execute(conn: &Connection, sql: &str, params: &[Value]) -> Result<usize, DbError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let changed = stmt.execute(rusqlite::params_from_iter(params.iter()))?;
    Ok(changed)
}

fn run_query(conn: &Connection, sql: &str, params: &[Value]) -> Result<QueryResult, DbError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    let mut cursor = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    while let Some(row) = cursor.next()? {
        let values = (0..columns.len())
            .map(|i| row.get_ref(i).map(Value::from))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(Row::new(columns.clone(), values));
    }

    Ok(QueryResult::new(columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: String,
        qty: i64,
    }

    fn setup() -> Db {
        let db = Db::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE items (id TEXT PRIMARY KEY, qty INTEGER NOT NULL);
             INSERT INTO items (id, qty) VALUES ('a', 1), ('b', 2);",
        )
        .unwrap();
        db
    }

    #[test]
    fn test_query_as() {
        let db = setup();
        let items: Vec<Item> = db
            .query_as("SELECT id, qty FROM items ORDER BY id", params![])
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], Item { id: "b".into(), qty: 2 });
    }

    #[test]
    fn test_query_one_not_found() {
        let db = setup();
        let result: Result<Item, _> =
            db.query_one("SELECT id, qty FROM items WHERE id = ?", params!["zzz"]);
        assert!(matches!(result, Err(DbError::NotFound)));
    }

    #[test]
    fn test_conditional_update_reports_changes() {
        let db = setup();
        let sql = "UPDATE items SET qty = 0 WHERE id = ? AND qty > 0";
        assert_eq!(db.execute(sql, params!["a"]).unwrap(), 1);
        assert_eq!(db.execute(sql, params!["a"]).unwrap(), 0);
    }

    #[test]
    fn test_update_returning() {
        let db = setup();
        let result = db
            .query(
                "UPDATE items SET qty = qty + 10 WHERE id = ? RETURNING qty",
                params!["b"],
            )
            .unwrap();
        assert_eq!(result.first().and_then(|r| r.get("qty")).cloned(), Some(Value::Integer(12)));
    }

    #[test]
    fn test_query_i64_null_is_zero() {
        let db = setup();
        let sum = db
            .query_i64("SELECT SUM(qty) FROM items WHERE id = 'none'", params![])
            .unwrap();
        assert_eq!(sum, 0);
    }

    #[test]
    fn test_transaction_commits() {
        let db = setup();
        db.transaction(|tx| {
            tx.execute("UPDATE items SET qty = 5 WHERE id = 'a'", params![])?;
            tx.execute("INSERT INTO items (id, qty) VALUES ('c', 3)", params![])?;
            Ok::<_, DbError>(())
        })
        .unwrap();

        let total = db.query_i64("SELECT SUM(qty) FROM items", params![]).unwrap();
        assert_eq!(total, 10);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = setup();
        let result: Result<(), DbError> = db.transaction(|tx| {
            tx.execute("UPDATE items SET qty = 100 WHERE id = 'a'", params![])?;
            Err(DbError::NotFound)
        });
        assert!(result.is_err());

        let item: Item = db
            .query_one("SELECT id, qty FROM items WHERE id = 'a'", params![])
            .unwrap();
        assert_eq!(item.qty, 1);
    }

    #[test]
    fn test_unique_violation_is_constraint() {
        let db = setup();
        let err = db
            .execute("INSERT INTO items (id, qty) VALUES ('a', 9)", params![])
            .unwrap_err();
        assert!(err.is_constraint());
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");
        {
            let db = Db::open(&path).unwrap();
            db.execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (42);")
                .unwrap();
        }
        let db = Db::open(&path).unwrap();
        assert_eq!(db.query_i64("SELECT v FROM t", params![]).unwrap(), 42);
    }
}
