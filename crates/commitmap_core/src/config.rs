//! Index configuration.

use crate::dir::VERSION;
use std::path::{Path, PathBuf};

/// Configuration for opening a [`crate::PersistentHashIndex`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding every storage kind (`<base>/hashes/...`).
    pub base_dir: PathBuf,

    /// Key schema version. Changing it starts a fresh table and deletes the
    /// tables of other versions.
    pub version: u32,

    /// Whether to create a missing table. When false, opening a missing
    /// table fails with [`crate::CoreError::IndexNotFound`].
    pub create_if_missing: bool,

    /// Whether an unreadable table (bad header, checksum failure, version
    /// mismatch) is deleted and rebuilt empty instead of failing the open.
    pub recreate_on_corruption: bool,

    /// Whether `flush` fsyncs. When false it only hands buffered bytes to
    /// the OS.
    pub sync_on_flush: bool,
}

impl Config {
    /// Creates a configuration rooted at `base_dir` with default settings.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            version: VERSION,
            create_if_missing: true,
            recreate_on_corruption: true,
            sync_on_flush: true,
        }
    }

    /// The base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Sets the key schema version.
    #[must_use]
    pub const fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Sets whether to create a missing table.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to rebuild an unreadable table.
    #[must_use]
    pub const fn recreate_on_corruption(mut self, value: bool) -> Self {
        self.recreate_on_corruption = value;
        self
    }

    /// Sets whether `flush` fsyncs.
    #[must_use]
    pub const fn sync_on_flush(mut self, value: bool) -> Self {
        self.sync_on_flush = value;
        self
    }
}
