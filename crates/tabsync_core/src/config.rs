//! Synchronizer configuration.

use crate::error::{SyncError, SyncResult};
use crate::sentinel::{
    BlobEncoding, SentinelCodec, BLOB_SENTINEL_BASE64, BLOB_SENTINEL_BASE85, DEFAULT_VERSION,
    NULL_SENTINEL,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::thread;

/// Upper bound on the default worker count.
const MAX_DEFAULT_WORKERS: usize = 32;

/// Default workers per available core.
const WORKERS_PER_CORE: usize = 4;

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_null_token() -> String {
    NULL_SENTINEL.to_string()
}

fn default_extension() -> String {
    "yaml".to_string()
}

fn default_true() -> bool {
    true
}

/// Configuration for a [`Synchronizer`](crate::Synchronizer).
///
/// Immutable once handed to the synchronizer. Every field except
/// `storage_root` has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directory holding one file per table.
    pub storage_root: PathBuf,

    /// Version tag written on save. A different tag on load is tolerated.
    #[serde(default = "default_version")]
    pub format_version: String,

    /// String that stands for null in table files.
    #[serde(default = "default_null_token")]
    pub null_token: String,

    /// Alphabet for blob columns on save. Both are accepted on load.
    #[serde(default)]
    pub blob_encoding: BlobEncoding,

    /// Worker count for load and save phases.
    ///
    /// `None` picks `min(32, 4 × available cores)`. `Some(1)` runs every
    /// table in declaration order on the calling thread.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Extension of table files, without the dot.
    #[serde(default = "default_extension")]
    pub file_extension: String,

    /// Whether to hold an advisory lock on the storage root while synced.
    #[serde(default = "default_true")]
    pub lock_directory: bool,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            format_version: default_version(),
            null_token: default_null_token(),
            blob_encoding: BlobEncoding::default(),
            workers: None,
            file_extension: default_extension(),
            lock_directory: true,
        }
    }

    /// Sets the version tag written on save.
    #[must_use]
    pub fn with_format_version(mut self, version: impl Into<String>) -> Self {
        self.format_version = version.into();
        self
    }

    /// Sets the null token.
    #[must_use]
    pub fn with_null_token(mut self, token: impl Into<String>) -> Self {
        self.null_token = token.into();
        self
    }

    /// Sets the blob alphabet.
    #[must_use]
    pub fn with_blob_encoding(mut self, encoding: BlobEncoding) -> Self {
        self.blob_encoding = encoding;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Sets the table file extension.
    #[must_use]
    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into();
        self
    }

    /// Sets whether the storage root is locked while synced.
    #[must_use]
    pub fn with_lock_directory(mut self, lock: bool) -> Self {
        self.lock_directory = lock;
        self
    }

    /// Builds a configuration from string options.
    ///
    /// Recognised keys: `storage_path` (required), `format_version` or
    /// `naay_version`, `null_token`, `blob_encoding` (a name or a sentinel),
    /// `write_workers` or `workers`, `file_extension`, `lock_directory`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for unknown keys, unparsable values or a
    /// missing `storage_path`.
    pub fn from_options<I, K, V>(options: I) -> SyncResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut root = None;
        let mut config = SyncConfig::new(PathBuf::new());

        for (key, value) in options {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "storage_path" | "storage_root" => root = Some(PathBuf::from(value)),
                "format_version" | "naay_version" => config.format_version = value.to_string(),
                "null_token" => config.null_token = value.to_string(),
                "blob_encoding" => {
                    config.blob_encoding = value
                        .parse()
                        .map_err(|e| SyncError::invalid_config(format!("{e}")))?;
                }
                "write_workers" | "workers" => {
                    let workers = value.trim().parse().map_err(|_| {
                        SyncError::invalid_config(format!("{key} must be an integer, got '{value}'"))
                    })?;
                    config.workers = Some(workers);
                }
                "file_extension" => config.file_extension = value.to_string(),
                "lock_directory" => {
                    config.lock_directory = match value.trim().to_ascii_lowercase().as_str() {
                        "1" | "true" | "yes" | "on" => true,
                        "0" | "false" | "no" | "off" => false,
                        _ => {
                            return Err(SyncError::invalid_config(format!(
                                "lock_directory must be a boolean, got '{value}'"
                            )))
                        }
                    };
                }
                other => {
                    return Err(SyncError::invalid_config(format!("unknown option '{other}'")));
                }
            }
        }

        config.storage_root =
            root.ok_or_else(|| SyncError::invalid_config("storage_path is required"))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the storage root or null token is empty,
    /// the null token could be mistaken for blob text, the worker count is
    /// zero or the file extension contains a path separator.
    pub fn validate(&self) -> SyncResult<()> {
        if self.storage_root.as_os_str().is_empty() {
            return Err(SyncError::invalid_config("storage root is empty"));
        }
        if self.null_token.is_empty() {
            return Err(SyncError::invalid_config("null token is empty"));
        }
        if self.null_token.starts_with(BLOB_SENTINEL_BASE85)
            || self.null_token.starts_with(BLOB_SENTINEL_BASE64)
        {
            return Err(SyncError::invalid_config(
                "null token must not start with a blob sentinel",
            ));
        }
        if self.workers == Some(0) {
            return Err(SyncError::invalid_config("workers must be at least 1"));
        }
        if self.file_extension.contains(['/', '\\', '\0']) {
            return Err(SyncError::invalid_config(format!(
                "file extension '{}' contains a path separator",
                self.file_extension
            )));
        }
        Ok(())
    }

    /// Returns the worker count to use, resolving the default.
    #[must_use]
    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            let cores = thread::available_parallelism().map_or(1, |n| n.get());
            MAX_DEFAULT_WORKERS.min(cores * WORKERS_PER_CORE)
        })
    }

    /// Returns the sentinel codec this configuration describes.
    #[must_use]
    pub fn codec(&self) -> SentinelCodec {
        SentinelCodec::new(self.null_token.clone(), self.blob_encoding)
    }
}
