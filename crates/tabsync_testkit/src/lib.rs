//! # tabsync Testkit
//!
//! Test utilities for tabsync.
//!
//! This crate provides:
//! - Temporary storage roots and synchronizer helpers
//! - Shared table sets and rows
//! - Property-based generators for cells and rows
//! - One-shot tracing setup for tests
//!
//! ## Usage
//!
//! ```rust
//! use tabsync_testkit::prelude::*;
//!
//! with_temp_root(|root| {
//!     let mut sync = root.memory_sync(vec![scenarios::users_table()], 1);
//!     sync.open().unwrap().close().unwrap();
//!     assert!(root.has_table_file("users"));
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
