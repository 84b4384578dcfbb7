//! Error types for relational store operations.

use crate::schema::ColumnType;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error reported by SQLite.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A table or column descriptor is invalid.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// The table has not been created in this store.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A row names a column the table does not declare.
    #[error("table '{table}' has no column '{column}'")]
    UnknownColumn {
        /// The table being written.
        table: String,
        /// The undeclared column.
        column: String,
    },

    /// A non-nullable column received a null value.
    #[error("column '{table}.{column}' may not be null")]
    NotNull {
        /// The table being written.
        table: String,
        /// The non-nullable column.
        column: String,
    },

    /// A blob was stored in a column declared with a scalar type.
    #[error("column '{table}.{column}' is declared {declared} but holds a blob")]
    BlobInScalarColumn {
        /// The table holding the value.
        table: String,
        /// The offending column.
        column: String,
        /// The declared column type.
        declared: ColumnType,
    },

    /// A stored value could not be converted to a cell.
    #[error("cannot read '{table}.{column}': {message}")]
    Conversion {
        /// The table being read.
        table: String,
        /// The column being read.
        column: String,
        /// Description of the problem.
        message: String,
    },

    /// A transaction operation was used out of order.
    #[error("transaction error: {0}")]
    Transaction(String),
}

impl StoreError {
    /// Create an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema(message.into())
    }
}
