//! Relational store trait definition.

use crate::error::StoreResult;
use crate::schema::TableDescriptor;
use crate::value::Row;

/// A transactional relational store.
///
/// This is the boundary tabsync consumes: table creation, one level of
/// transaction, bulk insert and full-table scan. The store owns its data;
/// tabsync never interprets anything beyond the rows it reads and writes.
///
/// # Invariants
///
/// - `create_table` is idempotent
/// - `insert_rows` inserts in slice order
/// - `scan_table` returns rows in storage order, with every declared column
///   present and typed by its declared [`ColumnType`](crate::ColumnType)
/// - Between `begin` and `rollback`, nothing written is observable afterwards
///
/// # Implementors
///
/// - [`super::SqliteStore`] - SQLite through `rusqlite`
/// - [`super::InMemoryStore`] - For testing
pub trait RelationalStore {
    /// Creates the table if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be created.
    fn create_table(&mut self, table: &TableDescriptor) -> StoreResult<()>;

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already open.
    fn begin(&mut self) -> StoreResult<()>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open or the commit fails.
    fn commit(&mut self) -> StoreResult<()>;

    /// Discards everything written since `begin`.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open.
    fn rollback(&mut self) -> StoreResult<()>;

    /// Deletes every row of the table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    fn clear_table(&mut self, table: &TableDescriptor) -> StoreResult<()>;

    /// Inserts rows in order and returns how many were inserted.
    ///
    /// Columns a row does not carry take the store's default.
    ///
    /// # Errors
    ///
    /// Returns an error if a row names an undeclared column or violates a
    /// constraint. Rows inserted before the failing one are not removed;
    /// callers wrap the call in a transaction.
    fn insert_rows(&mut self, table: &TableDescriptor, rows: &[Row]) -> StoreResult<usize>;

    /// Reads every row of the table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or a value cannot be
    /// converted.
    fn scan_table(&self, table: &TableDescriptor) -> StoreResult<Vec<Row>>;
}

impl<S: RelationalStore + ?Sized> RelationalStore for Box<S> {
    fn create_table(&mut self, table: &TableDescriptor) -> StoreResult<()> {
        (**self).create_table(table)
    }

    fn begin(&mut self) -> StoreResult<()> {
        (**self).begin()
    }

    fn commit(&mut self) -> StoreResult<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> StoreResult<()> {
        (**self).rollback()
    }

    fn clear_table(&mut self, table: &TableDescriptor) -> StoreResult<()> {
        (**self).clear_table(table)
    }

    fn insert_rows(&mut self, table: &TableDescriptor, rows: &[Row]) -> StoreResult<usize> {
        (**self).insert_rows(table, rows)
    }

    fn scan_table(&self, table: &TableDescriptor) -> StoreResult<Vec<Row>> {
        (**self).scan_table(table)
    }
}
