//! Test fixtures and storage-root helpers.
//!
//! Provides temporary storage roots, ready-made synchronizers and the
//! table sets shared by the integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use tabsync_core::{
    ColumnDescriptor, ColumnType, InMemoryStore, RelationalStore, Row, SqliteStore, SyncConfig,
    Synchronizer, TableDescriptor,
};
use tempfile::TempDir;

/// A temporary storage root with automatic cleanup.
pub struct TestRoot {
    temp_dir: TempDir,
}

impl TestRoot {
    /// Creates a new empty storage root.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the root path.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the default path of a table file under this root.
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.path().join(format!("{table}.yaml"))
    }

    /// Returns true if the table file exists.
    pub fn has_table_file(&self, table: &str) -> bool {
        self.table_path(table).exists()
    }

    /// Reads a table file as text.
    pub fn read_table(&self, table: &str) -> String {
        fs::read_to_string(self.table_path(table)).expect("Failed to read table file")
    }

    /// Reads a table file as bytes.
    pub fn read_table_bytes(&self, table: &str) -> Vec<u8> {
        fs::read(self.table_path(table)).expect("Failed to read table file")
    }

    /// Writes a table file verbatim.
    pub fn write_table(&self, table: &str, text: &str) {
        fs::write(self.table_path(table), text).expect("Failed to write table file");
    }

    /// Returns a default configuration for this root.
    pub fn config(&self) -> SyncConfig {
        SyncConfig::new(self.path())
    }

    /// Builds a SQLite-backed synchronizer over this root.
    pub fn sqlite_sync(&self, tables: Vec<TableDescriptor>, workers: usize) -> Synchronizer<SqliteStore> {
        let store = SqliteStore::open_in_memory().expect("Failed to open SQLite store");
        Synchronizer::new(tables, store, self.config().with_workers(workers))
            .expect("Failed to build synchronizer")
    }

    /// Builds an in-memory synchronizer over this root.
    pub fn memory_sync(&self, tables: Vec<TableDescriptor>, workers: usize) -> Synchronizer<InMemoryStore> {
        Synchronizer::new(tables, InMemoryStore::new(), self.config().with_workers(workers))
            .expect("Failed to build synchronizer")
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a temporary storage root.
///
/// # Example
///
/// ```rust
/// use tabsync_testkit::with_temp_root;
///
/// with_temp_root(|root| {
///     assert!(!root.has_table_file("users"));
/// });
/// ```
pub fn with_temp_root<F, R>(f: F) -> R
where
    F: FnOnce(&TestRoot) -> R,
{
    let root = TestRoot::new();
    f(&root)
}

/// Inserts rows into a store table, creating the table first.
pub fn seed<S: RelationalStore>(store: &mut S, table: &TableDescriptor, rows: &[Row]) {
    store.create_table(table).expect("Failed to create table");
    store.insert_rows(table, rows).expect("Failed to insert rows");
}

/// Reads every row of a store table.
pub fn dump_rows<S: RelationalStore>(store: &S, table: &TableDescriptor) -> Vec<Row> {
    store.scan_table(table).expect("Failed to scan table")
}

/// Table sets used across tests.
pub mod scenarios {
    use super::*;
    use tabsync_core::CellValue;

    /// `users(id text, name text)`.
    pub fn users_table() -> TableDescriptor {
        TableDescriptor::new("users")
            .column("id", ColumnType::Text)
            .column("name", ColumnType::Text)
    }

    /// The two `users` rows: `("1", "Ada")` and `("2", null)`.
    pub fn users_rows() -> Vec<Row> {
        vec![
            Row::new().with("id", "1").with("name", "Ada"),
            Row::new().with("id", "2").with("name", CellValue::Null),
        ]
    }

    /// A table with one column of every type and a non-nullable key.
    pub fn mixed_table() -> TableDescriptor {
        TableDescriptor::new("mixed")
            .with_column(ColumnDescriptor::new("key", ColumnType::Text).not_null())
            .column("count", ColumnType::Integer)
            .column("ratio", ColumnType::Real)
            .column("label", ColumnType::Text)
            .column("payload", ColumnType::Blob)
            .column("active", ColumnType::Boolean)
    }

    /// `count` tables named `t0`, `t1`, ... each with an id and a value.
    pub fn numbered_tables(count: usize) -> Vec<TableDescriptor> {
        (0..count)
            .map(|i| {
                TableDescriptor::new(format!("t{i}"))
                    .column("id", ColumnType::Integer)
                    .column("value", ColumnType::Text)
            })
            .collect()
    }

    /// `rows` rows for a table from [`numbered_tables`].
    pub fn numbered_rows(table: usize, rows: usize) -> Vec<Row> {
        (0..rows)
            .map(|i| {
                Row::new()
                    .with("id", i as i64)
                    .with("value", format!("table {table} row {i}"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_paths() {
        with_temp_root(|root| {
            assert_eq!(root.table_path("users"), root.path().join("users.yaml"));
            root.write_table("users", "rows: []\n");
            assert!(root.has_table_file("users"));
            assert_eq!(root.read_table("users"), "rows: []\n");
        });
    }

    #[test]
    fn test_seed_and_dump() {
        let mut store = InMemoryStore::new();
        let table = scenarios::users_table();
        seed(&mut store, &table, &scenarios::users_rows());
        assert_eq!(dump_rows(&store, &table), scenarios::users_rows());
    }

    #[test]
    fn test_numbered_tables() {
        let tables = scenarios::numbered_tables(3);
        assert_eq!(tables[2].name, "t2");
        assert_eq!(scenarios::numbered_rows(2, 4).len(), 4);
    }
}
