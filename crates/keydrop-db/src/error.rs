//! Database error types.

use thiserror::Error;

/// Errors that can occur when using the database.
#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to open the database.
    #[error("Failed to open database: {0}")]
    OpenError(String),

    /// Failed to execute a query.
    #[error("Query execution failed: {0}")]
    QueryError(String),

    /// A UNIQUE, CHECK or NOT NULL constraint rejected the statement.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Failed to deserialize a row.
    #[error("Deserialization error: {0}")]
    DeserializeError(String),

    /// Type conversion error.
    #[error("Type conversion error: {0}")]
    TypeError(String),

    /// Another thread panicked while holding the connection.
    #[error("Database connection lock poisoned")]
    LockPoisoned,

    /// No rows returned when one was expected.
    #[error("No rows returned")]
    NotFound,
}

impl DbError {
    /// Whether this error came from a constraint violation.
    pub fn is_constraint(&self) -> bool {
        matches!(self, DbError::Constraint(_))
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DbError::Constraint(e.to_string())
            }
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound,
            _ => DbError::QueryError(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::DeserializeError(e.to_string())
    }
}
