//! Error types for tabsync core.

use crate::scheduler::Phase;
use crate::synchronizer::SyncState;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while loading or saving tables.
#[derive(Debug, Error)]
pub enum SyncError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Structured-text codec error.
    #[error("codec error: {0}")]
    Codec(#[from] tabsync_codec::CodecError),

    /// Relational store error.
    #[error("store error: {0}")]
    Store(#[from] tabsync_store::StoreError),

    /// A table file could not be parsed.
    #[error("cannot parse table '{table}' from {}: {message}", path.display())]
    Parse {
        /// The table being loaded.
        table: String,
        /// The file that failed to parse.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// A cell failed validation against its declared column.
    #[error("table '{table}', row {row}, column '{column}': {message}")]
    Validation {
        /// The table being loaded.
        table: String,
        /// 0-based row index in the document.
        row: usize,
        /// The offending column.
        column: String,
        /// Description of the problem.
        message: String,
    },

    /// The configuration or table set is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation not permitted in the current state.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: SyncState,
        /// Attempted target state.
        to: SyncState,
    },

    /// Another synchronizer holds the storage directory.
    #[error("storage directory locked: {}", .0.display())]
    DirectoryLocked(PathBuf),

    /// A per-table job failed.
    #[error("table '{table}': {source}")]
    Table {
        /// The table whose job failed.
        table: String,
        /// The underlying failure.
        #[source]
        source: Box<SyncError>,
    },

    /// More than one table failed during a phase.
    #[error("{phase} failed for {} tables", failures.len())]
    Phase {
        /// The phase that failed.
        phase: Phase,
        /// One error per failed table, in table declaration order.
        failures: Vec<SyncError>,
    },
}

impl SyncError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Creates a validation error.
    pub fn validation(
        table: impl Into<String>,
        row: usize,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            table: table.into(),
            row,
            column: column.into(),
            message: message.into(),
        }
    }

    /// Attaches table context unless the error already names its table.
    #[must_use]
    pub fn in_table(self, table: &str) -> Self {
        match self {
            err @ (SyncError::Parse { .. }
            | SyncError::Validation { .. }
            | SyncError::Table { .. }) => err,
            other => SyncError::Table {
                table: table.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the table this error is about, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            SyncError::Parse { table, .. }
            | SyncError::Validation { table, .. }
            | SyncError::Table { table, .. } => Some(table),
            _ => None,
        }
    }

    /// Returns the individual failures: the phase's list, or just `self`.
    pub fn failures(&self) -> &[SyncError] {
        match self {
            SyncError::Phase { failures, .. } => failures,
            other => std::slice::from_ref(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_table_wraps_io_errors_once() {
        let err = SyncError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            .in_table("users")
            .in_table("other");
        assert_eq!(err.table(), Some("users"));
        assert!(err.to_string().starts_with("table 'users': I/O error"));
    }

    #[test]
    fn in_table_keeps_scoped_errors() {
        let err = SyncError::validation("users", 1, "name", "null in non-nullable column");
        let err = err.in_table("users");
        assert!(matches!(err, SyncError::Validation { row: 1, .. }));
    }

    #[test]
    fn phase_failures() {
        let err = SyncError::Phase {
            phase: Phase::Save,
            failures: vec![
                SyncError::invalid_config("a").in_table("t1"),
                SyncError::invalid_config("b").in_table("t2"),
            ],
        };
        assert_eq!(err.to_string(), "save failed for 2 tables");
        assert_eq!(err.failures().len(), 2);

        let single = SyncError::invalid_config("x");
        assert_eq!(single.failures().len(), 1);
    }

    #[test]
    fn state_transition_display() {
        let err = SyncError::InvalidStateTransition {
            from: SyncState::Closed,
            to: SyncState::Synced,
        };
        assert_eq!(
            err.to_string(),
            "invalid state transition from Closed to Synced"
        );
    }
}
