//! Table and column descriptors.
//!
//! Descriptors are supplied by the caller and treated as read-only metadata:
//! they decide the file a table lives in, the order columns are written in
//! and the type each stored string is parsed back into.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Real,
    /// UTF-8 text.
    Text,
    /// Arbitrary bytes.
    Blob,
    /// True or false.
    Boolean,
}

impl ColumnType {
    /// Returns the SQL type name used in `CREATE TABLE`.
    #[must_use]
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
            ColumnType::Blob => "BLOB",
            ColumnType::Boolean => "BOOLEAN",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Real => "real",
            ColumnType::Text => "text",
            ColumnType::Blob => "blob",
            ColumnType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

fn default_nullable() -> bool {
    true
}

/// Describes one column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Whether the column accepts null.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnDescriptor {
    /// Creates a nullable column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
        }
    }

    /// Marks the column as non-nullable.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column as part of the primary key.
    ///
    /// Primary key columns are non-nullable.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// Describes a table: its name and ordered columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name. Also names the table's file.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// Creates a table with no columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Appends a nullable column of the given type.
    #[must_use]
    pub fn column(self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.with_column(ColumnDescriptor::new(name, column_type))
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Checks that the descriptor can be used as a table and a file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the table name is empty, contains a path
    /// separator or a NUL, is `.` or `..`, or if the table has no columns or
    /// declares a column twice.
    pub fn validate(&self) -> StoreResult<()> {
        let name = self.name.as_str();
        if name.is_empty() {
            return Err(StoreError::invalid_schema("table name is empty"));
        }
        if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
            return Err(StoreError::invalid_schema(format!(
                "table name '{name}' cannot be used as a file name"
            )));
        }
        if self.columns.is_empty() {
            return Err(StoreError::invalid_schema(format!(
                "table '{name}' declares no columns"
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.name.is_empty() {
                return Err(StoreError::invalid_schema(format!(
                    "table '{name}' has a column with an empty name"
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(StoreError::invalid_schema(format!(
                    "table '{name}' declares column '{}' twice",
                    column.name
                )));
            }
        }
        Ok(())
    }
}
