//! # tabsync Core
//!
//! Keeps a relational store in step with a directory of plain-text table
//! files, one file per table.
//!
//! This crate provides:
//! - Sentinel encoding of null and binary cells into string-only documents
//! - The table document model (`version` tag plus ordered rows)
//! - File loading and atomic file dumping per table
//! - A bounded worker pool for parallel per-table I/O
//! - The [`Synchronizer`] with its Idle, Synced and Closed lifecycle
//!
//! ## File Layout
//!
//! ```text
//! <storage_root>/
//! ├─ users.yaml
//! └─ orders.yaml
//! ```
//!
//! Each file reads:
//!
//! ```text
//! version: 1.0
//! rows:
//!   - id: 1
//!     name: Ada
//!   - id: 2
//!     name: <:__NULL__:>
//! ```
//!
//! ## Known Limitation
//!
//! A text cell whose value is exactly the null token loads back as null.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod document;
mod dumper;
mod error;
mod loader;
mod scheduler;
mod sentinel;
mod synchronizer;

pub use config::SyncConfig;
pub use dir::{write_atomic, StorageDir, LOCK_FILE};
pub use document::{
    DocumentError, DocumentRow, TableDocument, LEGACY_VERSION_KEY, ROWS_KEY, VERSION_KEY,
};
pub use dumper::FileDumper;
pub use error::{SyncError, SyncResult};
pub use loader::{FileLoader, TableLoad, TableLoadReport};
pub use scheduler::{Phase, Scheduler};
pub use sentinel::{
    decode_blob, BlobEncoding, SentinelCodec, SentinelError, BLOB_LINE_WIDTH,
    BLOB_SENTINEL_BASE64, BLOB_SENTINEL_BASE85, DEFAULT_VERSION, NULL_SENTINEL,
};
pub use synchronizer::{CloseError, SyncScope, SyncState, Synchronizer};

// Re-export the store types callers need to describe tables and read rows.
pub use tabsync_store::{
    CellValue, ColumnDescriptor, ColumnType, InMemoryStore, RelationalStore, Row, SqliteStore,
    StoreError, TableDescriptor,
};
