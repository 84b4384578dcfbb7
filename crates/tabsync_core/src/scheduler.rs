//! Parallel I/O scheduling for per-table jobs.
//!
//! A phase fans out one job per table and waits for all of them. Jobs are
//! never cancelled: when one fails the others still run to completion, and
//! the failures are reported together once the pool drains.

use crate::error::{SyncError, SyncResult};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::fmt;
use tracing::debug;

/// A synchronization phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Reading table files into the store.
    Load,
    /// Writing store rows back to table files.
    Save,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Load => f.write_str("load"),
            Phase::Save => f.write_str("save"),
        }
    }
}

/// Runs independent jobs on a bounded worker pool.
///
/// With one worker, or when the pool cannot be built, jobs run on the
/// calling thread in slice order.
pub struct Scheduler {
    workers: usize,
    pool: Option<ThreadPool>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.workers)
            .field("parallel", &self.pool.is_some())
            .finish()
    }
}

impl Scheduler {
    /// Creates a scheduler with `workers` threads.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        if workers == 1 {
            return Self::sequential();
        }

        match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tabsync-io-{i}"))
            .build()
        {
            Ok(pool) => Self {
                workers,
                pool: Some(pool),
            },
            Err(err) => {
                debug!(workers, error = %err, "worker pool unavailable, running sequentially");
                Self::sequential()
            }
        }
    }

    /// Creates a scheduler that runs every job on the calling thread.
    pub fn sequential() -> Self {
        Self {
            workers: 1,
            pool: None,
        }
    }

    /// Returns the number of workers.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns true if jobs run on a thread pool.
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Runs `f` for every job and returns the results in job order.
    ///
    /// # Errors
    ///
    /// Every job runs regardless of failures. A single failure is returned
    /// as is; several are aggregated into [`SyncError::Phase`] in job order.
    pub fn run<J, T, F>(&self, phase: Phase, jobs: &[J], f: F) -> SyncResult<Vec<T>>
    where
        J: Sync,
        T: Send,
        F: Fn(&J) -> SyncResult<T> + Sync,
    {
        let results: Vec<SyncResult<T>> = match &self.pool {
            Some(pool) => pool.install(|| jobs.par_iter().map(|job| f(job)).collect()),
            None => jobs.iter().map(|job| f(job)).collect(),
        };

        let mut values = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(value) => values.push(value),
                Err(err) => failures.push(err),
            }
        }

        match failures.len() {
            0 => Ok(values),
            1 => Err(failures.remove(0)),
            _ => Err(SyncError::Phase { phase, failures }),
        }
    }
}
