//! Synchronizer facade and scoped sync sessions.

use crate::config::SyncConfig;
use crate::dir::StorageDir;
use crate::dumper::FileDumper;
use crate::error::{SyncError, SyncResult};
use crate::loader::{FileLoader, TableLoad, TableLoadReport};
use crate::scheduler::{Phase, Scheduler};
use std::collections::HashSet;
use std::fmt;
use tabsync_store::{RelationalStore, Row, TableDescriptor};
use tracing::{debug, debug_span, info, warn};

/// Lifecycle state of a [`Synchronizer`].
///
/// ```text
/// Idle --open--> Synced --close / drop--> Closed
/// ```
///
/// A closed synchronizer is not reusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// No scope has been opened yet.
    Idle,
    /// Table files are loaded into the store and a scope is open.
    Synced,
    /// The scope has ended.
    Closed,
}

/// Keeps a relational store in step with a directory of table files.
///
/// `Synchronizer` owns the table set, the store and the worker pool.
/// [`open`](Self::open) loads every table file into the store and returns a
/// [`SyncScope`]; closing the scope writes every table back. Dropping the
/// scope without closing it discards in-memory changes and leaves the files
/// untouched.
///
/// # Example
///
/// ```rust
/// use tabsync_core::{ColumnType, SqliteStore, SyncConfig, Synchronizer, TableDescriptor};
///
/// let root = tempfile::tempdir().unwrap();
/// let users = TableDescriptor::new("users")
///     .column("id", ColumnType::Text)
///     .column("name", ColumnType::Text);
///
/// let mut sync = Synchronizer::new(
///     vec![users],
///     SqliteStore::open_in_memory().unwrap(),
///     SyncConfig::new(root.path()),
/// )
/// .unwrap();
///
/// sync.run(|store| {
///     store
///         .connection()
///         .execute("INSERT INTO users (id, name) VALUES ('1', 'Ada')", [])
///         .map_err(tabsync_core::StoreError::from)?;
///     Ok::<_, tabsync_core::SyncError>(())
/// })
/// .unwrap();
///
/// assert!(root.path().join("users.yaml").exists());
/// ```
pub struct Synchronizer<S: RelationalStore> {
    /// Tables in declaration order.
    tables: Vec<TableDescriptor>,
    /// The relational store.
    store: S,
    /// Configuration.
    config: SyncConfig,
    /// Current lifecycle state.
    state: SyncState,
    /// Worker pool for load and save phases.
    scheduler: Scheduler,
    loader: FileLoader,
    dumper: FileDumper,
}

impl<S: RelationalStore> fmt::Debug for Synchronizer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("tables", &self.table_names())
            .field("state", &self.state)
            .field("storage_root", &self.config.storage_root)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl<S: RelationalStore> Synchronizer<S> {
    /// Creates a synchronizer in the `Idle` state.
    ///
    /// The worker pool is sized to the configured worker count, capped at
    /// the number of tables.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration is invalid, a table
    /// descriptor is malformed or two tables share a name.
    pub fn new(tables: Vec<TableDescriptor>, store: S, config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;

        let mut seen = HashSet::new();
        for table in &tables {
            table
                .validate()
                .map_err(|e| SyncError::invalid_config(e.to_string()))?;
            if !seen.insert(table.name.as_str()) {
                return Err(SyncError::invalid_config(format!(
                    "table '{}' is declared more than once",
                    table.name
                )));
            }
        }

        let workers = config.resolved_workers().min(tables.len()).max(1);
        let codec = config.codec();

        Ok(Self {
            loader: FileLoader::new(codec.clone(), config.format_version.as_str()),
            dumper: FileDumper::new(codec, config.format_version.as_str()),
            scheduler: Scheduler::new(workers),
            tables,
            store,
            config,
            state: SyncState::Idle,
        })
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the tables in declaration order.
    #[must_use]
    pub fn tables(&self) -> &[TableDescriptor] {
        &self.tables
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the synchronizer and returns the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Loads every table file into the store and opens a scope.
    ///
    /// Tables are created if missing. Files are read in parallel; the rows
    /// are then applied in one transaction: every table is cleared and
    /// refilled in file order. On failure the transaction is rolled back,
    /// the directory lock is released and the synchronizer stays `Idle`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` unless the synchronizer is `Idle`,
    /// `DirectoryLocked` if another holder has the storage root, and any
    /// parse, validation, I/O or store error from the load phase.
    pub fn open(&mut self) -> SyncResult<SyncScope<'_, S>> {
        if self.state != SyncState::Idle {
            return Err(SyncError::InvalidStateTransition {
                from: self.state,
                to: SyncState::Synced,
            });
        }

        let _span = debug_span!("open", root = %self.config.storage_root.display()).entered();

        let mut dir = StorageDir::open(&self.config.storage_root, &self.config.file_extension)?;
        if self.config.lock_directory {
            dir.lock()?;
        }

        for table in &self.tables {
            self.store
                .create_table(table)
                .map_err(|e| SyncError::from(e).in_table(&table.name))?;
        }

        let loads = self.load_all(&dir)?;
        self.apply(&loads)?;

        let reports: Vec<TableLoadReport> = loads.into_iter().map(|load| load.report).collect();
        info!(
            tables = reports.len(),
            rows = reports.iter().map(|r| r.rows).sum::<usize>(),
            "tables loaded"
        );

        self.state = SyncState::Synced;
        Ok(SyncScope {
            sync: self,
            dir,
            reports,
            closed: false,
        })
    }

    /// Runs `f` inside a scope.
    ///
    /// The scope is closed (saving every table) when `f` returns `Ok`, and
    /// abandoned without saving when it returns `Err`.
    ///
    /// # Errors
    ///
    /// Returns the error from opening the scope, from `f`, or from saving.
    pub fn run<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut S) -> Result<T, E>,
        E: From<SyncError>,
    {
        let mut scope = self.open()?;
        match f(scope.store_mut()) {
            Ok(value) => {
                scope.close().map_err(CloseError::into_error)?;
                Ok(value)
            }
            Err(err) => {
                scope.abort();
                Err(err)
            }
        }
    }

    fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Reads every table file through the worker pool.
    fn load_all(&self, dir: &StorageDir) -> SyncResult<Vec<TableLoad>> {
        let _span = debug_span!("load_phase", tables = self.tables.len()).entered();
        let loader = &self.loader;

        self.scheduler.run(Phase::Load, &self.tables, |table| {
            loader
                .load(table, &dir.table_path(&table.name))
                .map_err(|e| e.in_table(&table.name))
        })
    }

    /// Replaces the store contents with the loaded rows in one transaction.
    fn apply(&mut self, loads: &[TableLoad]) -> SyncResult<()> {
        self.store.begin()?;

        let result = self.apply_in_transaction(loads);
        match result {
            Ok(()) => {
                if let Err(err) = self.store.commit() {
                    self.rollback_after_error();
                    return Err(err.into());
                }
                Ok(())
            }
            Err(err) => {
                self.rollback_after_error();
                Err(err)
            }
        }
    }

    fn apply_in_transaction(&mut self, loads: &[TableLoad]) -> SyncResult<()> {
        for table in self.tables.iter().rev() {
            self.store
                .clear_table(table)
                .map_err(|e| SyncError::from(e).in_table(&table.name))?;
        }

        for (table, load) in self.tables.iter().zip(loads) {
            let inserted = self
                .store
                .insert_rows(table, &load.rows)
                .map_err(|e| SyncError::from(e).in_table(&table.name))?;
            debug!(table = %table.name, rows = inserted, "rows inserted");
        }
        Ok(())
    }

    fn rollback_after_error(&mut self) {
        if let Err(err) = self.store.rollback() {
            warn!(error = %err, "rollback after failed load also failed");
        }
    }

    /// Scans every table and writes its file through the worker pool.
    fn save_all(&self, dir: &StorageDir) -> SyncResult<usize> {
        let _span = debug_span!("save_phase", tables = self.tables.len()).entered();

        let jobs = self
            .tables
            .iter()
            .map(|table| {
                self.store
                    .scan_table(table)
                    .map(|rows| (table, rows))
                    .map_err(|e| SyncError::from(e).in_table(&table.name))
            })
            .collect::<SyncResult<Vec<(&TableDescriptor, Vec<Row>)>>>()?;

        let dumper = &self.dumper;
        let written = self.scheduler.run(Phase::Save, &jobs, |(table, rows)| {
            dumper
                .dump(table, rows, &dir.table_path(&table.name))
                .map_err(|e| e.in_table(&table.name))
        })?;

        let rows: usize = written.iter().sum();
        info!(tables = written.len(), rows, "tables saved");
        Ok(rows)
    }
}

/// An open sync session.
///
/// While the scope lives, the store holds the loaded rows and the storage
/// root is locked (unless locking is disabled). End it with
/// [`close`](Self::close) to write every table back. Dropping it instead is
/// an abnormal exit: nothing is written and the synchronizer is `Closed`.
pub struct SyncScope<'a, S: RelationalStore> {
    sync: &'a mut Synchronizer<S>,
    dir: StorageDir,
    reports: Vec<TableLoadReport>,
    closed: bool,
}

impl<S: RelationalStore> fmt::Debug for SyncScope<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncScope")
            .field("dir", &self.dir)
            .field("reports", &self.reports)
            .finish_non_exhaustive()
    }
}

impl<'a, S: RelationalStore> SyncScope<'a, S> {
    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.sync.store
    }

    /// Returns the store for mutation.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.sync.store
    }

    /// Returns the tables in declaration order.
    #[must_use]
    pub fn tables(&self) -> &[TableDescriptor] {
        &self.sync.tables
    }

    /// Returns what the load found, one report per table in declaration
    /// order.
    #[must_use]
    pub fn load_report(&self) -> &[TableLoadReport] {
        &self.reports
    }

    /// Writes every table to its file without ending the scope.
    ///
    /// Returns the total number of rows written. Saving is a full replace,
    /// so it can be retried after a failure.
    ///
    /// # Errors
    ///
    /// Returns the store error if a scan fails (nothing is written), or the
    /// dump failures once every table job has finished. Files written by
    /// the tables that succeeded stay in place.
    pub fn save(&self) -> SyncResult<usize> {
        self.sync.save_all(&self.dir)
    }

    /// Saves every table and ends the scope.
    ///
    /// # Errors
    ///
    /// On failure the scope is handed back inside the [`CloseError`] so the
    /// caller can retry or drop it.
    pub fn close(mut self) -> Result<(), CloseError<'a, S>> {
        match self.save() {
            Ok(_) => {
                self.finish();
                Ok(())
            }
            Err(error) => Err(CloseError { error, scope: self }),
        }
    }

    /// Ends the scope without saving.
    pub fn abort(self) {
        drop(self);
    }

    fn finish(&mut self) {
        self.closed = true;
        self.sync.state = SyncState::Closed;
        self.dir.unlock();
    }
}

impl<S: RelationalStore> Drop for SyncScope<'_, S> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                root = %self.dir.path().display(),
                "sync scope ended without close, discarding changes"
            );
            self.finish();
        }
    }
}

/// A failed [`SyncScope::close`].
///
/// Holds the error and the still-open scope.
pub struct CloseError<'a, S: RelationalStore> {
    error: SyncError,
    scope: SyncScope<'a, S>,
}

impl<'a, S: RelationalStore> CloseError<'a, S> {
    /// Returns the error.
    #[must_use]
    pub fn error(&self) -> &SyncError {
        &self.error
    }

    /// Returns the error, dropping the scope (an abnormal exit).
    pub fn into_error(self) -> SyncError {
        self.error
    }

    /// Returns the scope so the close can be retried.
    pub fn into_scope(self) -> SyncScope<'a, S> {
        self.scope
    }
}

impl<S: RelationalStore> fmt::Debug for CloseError<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<S: RelationalStore> fmt::Display for CloseError<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "close failed: {}", self.error)
    }
}

impl<S: RelationalStore> std::error::Error for CloseError<'_, S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
