//! In-memory relational store for testing.

use crate::backend::RelationalStore;
use crate::error::{StoreError, StoreResult};
use crate::schema::{ColumnType, TableDescriptor};
use crate::value::{CellValue, Row};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Table {
    descriptor: TableDescriptor,
    rows: Vec<Row>,
}

/// An in-memory relational store.
///
/// Suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral tables that never touch SQL
///
/// Rollback restores a snapshot taken at `begin`. Declared columns and
/// NOT NULL are enforced on insert; nothing else is.
///
/// # Example
///
/// ```rust
/// use tabsync_store::{ColumnType, InMemoryStore, RelationalStore, Row, TableDescriptor};
///
/// let table = TableDescriptor::new("t").column("x", ColumnType::Integer);
/// let mut store = InMemoryStore::new();
/// store.create_table(&table).unwrap();
/// store.insert_rows(&table, &[Row::new().with("x", 1i64)]).unwrap();
/// assert_eq!(store.row_count("t"), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: HashMap<String, Table>,
    snapshot: Option<HashMap<String, Table>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of rows in a table, or 0 if it does not exist.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.rows.len())
    }

    /// Returns true if a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn table_mut(&mut self, name: &str) -> StoreResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }
}

impl RelationalStore for InMemoryStore {
    fn create_table(&mut self, table: &TableDescriptor) -> StoreResult<()> {
        table.validate()?;
        self.tables
            .entry(table.name.clone())
            .or_insert_with(|| Table {
                descriptor: table.clone(),
                rows: Vec::new(),
            });
        Ok(())
    }

    fn begin(&mut self) -> StoreResult<()> {
        if self.snapshot.is_some() {
            return Err(StoreError::Transaction(
                "a transaction is already open".into(),
            ));
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        match self.snapshot.take() {
            Some(_) => Ok(()),
            None => Err(StoreError::Transaction("no open transaction".into())),
        }
    }

    fn rollback(&mut self) -> StoreResult<()> {
        match self.snapshot.take() {
            Some(snapshot) => {
                self.tables = snapshot;
                Ok(())
            }
            None => Err(StoreError::Transaction("no open transaction".into())),
        }
    }

    fn clear_table(&mut self, table: &TableDescriptor) -> StoreResult<()> {
        self.table_mut(&table.name)?.rows.clear();
        Ok(())
    }

    fn insert_rows(&mut self, table: &TableDescriptor, rows: &[Row]) -> StoreResult<usize> {
        let stored = self.table_mut(&table.name)?;

        for row in rows {
            let mut full = Row::new();
            for column in &stored.descriptor.columns {
                let value = row.get(&column.name).cloned().unwrap_or(CellValue::Null);
                if value.is_null() && !column.nullable {
                    return Err(StoreError::NotNull {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
                if matches!(value, CellValue::Blob(_)) && column.column_type != ColumnType::Blob {
                    return Err(StoreError::BlobInScalarColumn {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        declared: column.column_type,
                    });
                }
                full.set(column.name.clone(), value);
            }
            if let Some((column, _)) = row
                .iter()
                .find(|(c, _)| stored.descriptor.find_column(c).is_none())
            {
                return Err(StoreError::UnknownColumn {
                    table: table.name.clone(),
                    column: column.to_string(),
                });
            }
            stored.rows.push(full);
        }

        Ok(rows.len())
    }

    fn scan_table(&self, table: &TableDescriptor) -> StoreResult<Vec<Row>> {
        self.tables
            .get(&table.name)
            .map(|t| t.rows.clone())
            .ok_or_else(|| StoreError::TableNotFound(table.name.clone()))
    }
}
