//! # tabsync Store
//!
//! Relational store trait and implementations for tabsync.
//!
//! This crate is the relational side of a sync: tables are described by the
//! caller, filled from table files on open and scanned back on close. The
//! store does not know about files, sentinels or documents.
//!
//! ## Design Principles
//!
//! - Whole-table operations only (clear, bulk insert, full scan)
//! - One level of transaction: `begin`, `commit`, `rollback`
//! - Scanned cells are typed by the declared column type
//! - A column absent from a row is not the same as a null cell
//!
//! ## Available Stores
//!
//! - [`SqliteStore`] - SQLite through `rusqlite`, connection exposed
//! - [`InMemoryStore`] - For testing and ephemeral tables
//!
//! ## Example
//!
//! ```rust
//! use tabsync_store::{CellValue, ColumnType, InMemoryStore, RelationalStore, Row, TableDescriptor};
//!
//! let users = TableDescriptor::new("users")
//!     .column("id", ColumnType::Text)
//!     .column("name", ColumnType::Text);
//!
//! let mut store = InMemoryStore::new();
//! store.create_table(&users).unwrap();
//! store.insert_rows(&users, &[Row::new().with("id", "2")]).unwrap();
//!
//! let rows = store.scan_table(&users).unwrap();
//! assert_eq!(rows[0].get("name"), Some(&CellValue::Null));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
mod schema;
mod sqlite;
mod value;

pub use backend::RelationalStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use schema::{ColumnDescriptor, ColumnType, TableDescriptor};
pub use sqlite::SqliteStore;
pub use value::{CellValue, Row};

/// Re-exported so callers can name the connection type without a direct
/// `rusqlite` dependency.
pub use rusqlite;
