//! Storage directory management.
//!
//! This module handles the file system layout of a synchronized table set:
//!
//! ```text
//! <storage_root>/
//! ├─ .tabsync.lock     # Advisory lock held while synced
//! ├─ users.yaml        # One file per table
//! └─ orders.yaml
//! ```
//!
//! Table files are replaced atomically: a crash mid-write leaves either the
//! previous file or the new one, never a truncated mix.

use crate::error::{SyncError, SyncResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Advisory lock file inside the storage root.
pub const LOCK_FILE: &str = ".tabsync.lock";

/// Manages the storage root and its optional lock.
#[derive(Debug)]
pub struct StorageDir {
    /// Root directory path.
    path: PathBuf,
    /// Table file extension, without the dot.
    extension: String,
    /// Lock file handle while the lock is held.
    lock_file: Option<File>,
}

impl StorageDir {
    /// Opens the storage root, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the path
    /// exists but is not a directory.
    pub fn open(path: &Path, extension: &str) -> SyncResult<Self> {
        fs::create_dir_all(path)?;

        if !path.is_dir() {
            return Err(SyncError::invalid_config(format!(
                "storage root is not a directory: {}",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            extension: extension.to_string(),
            lock_file: None,
        })
    }

    /// Takes the exclusive advisory lock on the storage root.
    ///
    /// Does nothing if this instance already holds it.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryLocked` if another holder has the lock.
    pub fn lock(&mut self) -> SyncResult<()> {
        if self.lock_file.is_some() {
            return Ok(());
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(SyncError::DirectoryLocked(self.path.clone()));
        }

        self.lock_file = Some(lock_file);
        Ok(())
    }

    /// Releases the lock if held.
    pub fn unlock(&mut self) {
        if let Some(file) = self.lock_file.take() {
            // Closing the handle releases the lock as well.
            let _ = FileExt::unlock(&file);
        }
    }

    /// Returns true if this instance holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock_file.is_some()
    }

    /// Returns the storage root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file path of a table.
    #[must_use]
    pub fn table_path(&self, table: &str) -> PathBuf {
        if self.extension.is_empty() {
            self.path.join(table)
        } else {
            self.path.join(format!("{table}.{}", self.extension))
        }
    }
}

impl Drop for StorageDir {
    fn drop(&mut self) {
        self.unlock();
    }
}

/// Replaces `path` with `bytes` atomically.
///
/// Uses the write-then-rename pattern:
/// 1. Write to a hidden temporary file next to the target
/// 2. Sync the temporary file to disk
/// 3. Rename it over the target
/// 4. Fsync the directory so the rename is durable
///
/// Parent directories are created if absent.
///
/// # Errors
///
/// Returns an I/O error from any step; the temporary file is removed if the
/// write or rename fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> SyncResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| SyncError::invalid_config(format!("not a file path: {}", path.display())))?;
    let temp_path = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));

    let written = File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&temp_path, path));
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    sync_directory(&parent)?;
    Ok(())
}

#[cfg(unix)]
fn sync_directory(path: &Path) -> SyncResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_path: &Path) -> SyncResult<()> {
    // NTFS journals metadata; directories cannot be fsynced on Windows.
    Ok(())
}
