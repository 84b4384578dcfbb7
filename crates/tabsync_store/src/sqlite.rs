//! SQLite store.

use crate::backend::RelationalStore;
use crate::error::{StoreError, StoreResult};
use crate::schema::{ColumnDescriptor, ColumnType, TableDescriptor};
use crate::value::{CellValue, Row};
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::Connection;
use std::path::Path;

/// A [`RelationalStore`] backed by a SQLite connection.
///
/// The connection stays reachable through [`connection`](Self::connection)
/// so callers can run arbitrary SQL while tables are synced.
///
/// Rows are scanned in `rowid` order, which is insertion order. Integer
/// primary keys are declared `INT` so they never alias the rowid.
///
/// # Example
///
/// ```rust
/// use tabsync_store::{ColumnType, RelationalStore, Row, SqliteStore, TableDescriptor};
///
/// let users = TableDescriptor::new("users")
///     .column("id", ColumnType::Text)
///     .column("name", ColumnType::Text);
///
/// let mut store = SqliteStore::open_in_memory().unwrap();
/// store.create_table(&users).unwrap();
/// store
///     .insert_rows(&users, &[Row::new().with("id", "1").with("name", "Ada")])
///     .unwrap();
///
/// let count: i64 = store
///     .connection()
///     .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
///     .unwrap();
/// assert_eq!(count, 1);
/// ```
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Opens or creates a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Wraps an existing connection.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Returns the underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Returns the underlying connection mutably.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Consumes the store and returns the connection.
    #[must_use]
    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

impl RelationalStore for SqliteStore {
    fn create_table(&mut self, table: &TableDescriptor) -> StoreResult<()> {
        table.validate()?;
        self.conn.execute_batch(&create_table_sql(table))?;
        Ok(())
    }

    fn begin(&mut self) -> StoreResult<()> {
        if !self.conn.is_autocommit() {
            return Err(StoreError::Transaction(
                "a transaction is already open".into(),
            ));
        }
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        if self.conn.is_autocommit() {
            return Err(StoreError::Transaction("no open transaction".into()));
        }
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if self.conn.is_autocommit() {
            return Err(StoreError::Transaction("no open transaction".into()));
        }
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn clear_table(&mut self, table: &TableDescriptor) -> StoreResult<()> {
        self.conn
            .execute(&format!("DELETE FROM {}", quote_ident(&table.name)), [])?;
        Ok(())
    }

    fn insert_rows(&mut self, table: &TableDescriptor, rows: &[Row]) -> StoreResult<usize> {
        let name = quote_ident(&table.name);

        for row in rows {
            if let Some((column, _)) = row.iter().find(|(c, _)| table.find_column(c).is_none()) {
                return Err(StoreError::UnknownColumn {
                    table: table.name.clone(),
                    column: column.to_string(),
                });
            }

            if row.is_empty() {
                self.conn
                    .execute(&format!("INSERT INTO {name} DEFAULT VALUES"), [])?;
                continue;
            }

            let columns: Vec<String> = row.iter().map(|(c, _)| quote_ident(c)).collect();
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT INTO {name} ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            );

            let mut stmt = self.conn.prepare_cached(&sql)?;
            stmt.execute(rusqlite::params_from_iter(row.iter().map(|(_, v)| v)))?;
        }

        Ok(rows.len())
    }

    fn scan_table(&self, table: &TableDescriptor) -> StoreResult<Vec<Row>> {
        let columns: Vec<String> = table.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            columns.join(", "),
            quote_ident(&table.name)
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();

        while let Some(sql_row) = rows.next()? {
            let mut row = Row::new();
            for (idx, column) in table.columns.iter().enumerate() {
                let value = cell_from_sql(&table.name, column, sql_row.get_ref(idx)?)?;
                row.set(column.name.clone(), value);
            }
            out.push(row);
        }

        Ok(out)
    }
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::Owned(Value::Null),
            CellValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            CellValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            CellValue::Boolean(v) => ToSqlOutput::Owned(Value::Integer(i64::from(*v))),
            CellValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            CellValue::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}

/// Converts a stored value, using the declared type where SQLite's storage
/// class loses information.
fn cell_from_sql(
    table: &str,
    column: &ColumnDescriptor,
    value: ValueRef<'_>,
) -> StoreResult<CellValue> {
    Ok(match (column.column_type, value) {
        (_, ValueRef::Null) => CellValue::Null,
        (ColumnType::Boolean, ValueRef::Integer(v)) => CellValue::Boolean(v != 0),
        (ColumnType::Real, ValueRef::Integer(v)) => CellValue::Real(v as f64),
        (_, ValueRef::Integer(v)) => CellValue::Integer(v),
        (_, ValueRef::Real(v)) => CellValue::Real(v),
        (ColumnType::Blob, ValueRef::Text(v) | ValueRef::Blob(v)) => CellValue::Blob(v.to_vec()),
        (ColumnType::Text, ValueRef::Text(v) | ValueRef::Blob(v)) | (_, ValueRef::Text(v)) => {
            match std::str::from_utf8(v) {
                Ok(text) => CellValue::Text(text.to_string()),
                Err(e) => {
                    return Err(StoreError::Conversion {
                        table: table.to_string(),
                        column: column.name.clone(),
                        message: e.to_string(),
                    })
                }
            }
        }
        (declared, ValueRef::Blob(_)) => {
            return Err(StoreError::BlobInScalarColumn {
                table: table.to_string(),
                column: column.name.clone(),
                declared,
            })
        }
    })
}

fn create_table_sql(table: &TableDescriptor) -> String {
    let mut defs: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            // `INTEGER PRIMARY KEY` would make the key the rowid and scans
            // would come back in key order.
            let sql_type = match c.column_type {
                ColumnType::Integer if c.primary_key => "INT",
                other => other.sql_name(),
            };
            let mut def = format!("{} {}", quote_ident(&c.name), sql_type);
            if !c.nullable {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect();

    let keys: Vec<String> = table
        .columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| quote_ident(&c.name))
        .collect();
    if !keys.is_empty() {
        defs.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(&table.name),
        defs.join(", ")
    )
}

/// Quotes an SQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
