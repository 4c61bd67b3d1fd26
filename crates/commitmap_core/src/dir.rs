//! On-disk layout of index tables.
//!
//! ```text
//! <base>/
//! └─ hashes/
//!    ├─ <log_id>.lock     # advisory lock, held for the whole session
//!    ├─ <log_id>.3        # current table
//!    └─ <log_id>.2        # stale generation, removed on open
//! ```
//!
//! The log id combines the project name with a digest of its root set, so a
//! changed root set (and with it a changed root numbering) never reads a
//! table written for another one.

use crate::error::{CoreError, CoreResult};
use crate::root::RootRegistry;
use fs2::FileExt;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Storage kind of the commit hash tables.
pub const STORAGE_KIND: &str = "hashes";

/// Current key schema version of the commit hash tables.
pub const VERSION: u32 = 3;

/// Storage kind of an older layout that kept root paths in a separate
/// table. Its files are removed on open.
pub const LEGACY_ROOTS_KIND: &str = "roots";

/// Digest bytes kept in a log id.
const LOG_ID_DIGEST_BYTES: usize = 8;

/// Derives the file-name-safe id of a project's table.
///
/// ```rust
/// use commitmap_core::{calc_log_id, RootRegistry};
///
/// let id = calc_log_id("my project", &RootRegistry::new(["/src/app"]));
/// assert!(id.starts_with("my_project."));
/// ```
#[must_use]
pub fn calc_log_id(project_name: &str, registry: &RootRegistry) -> String {
    let mut hasher = Sha256::new();
    for root in registry.iter() {
        hasher.update(root.path().to_string_lossy().as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();

    let name: String = project_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let hex: String = digest[..LOG_ID_DIGEST_BYTES]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();

    format!("{name}.{hex}")
}

/// Path of the table for `log_id` at `version`.
#[must_use]
pub fn table_path(base: &Path, kind: &str, log_id: &str, version: u32) -> PathBuf {
    base.join(kind).join(format!("{log_id}.{version}"))
}

/// Removes every versioned table of `log_id` under `kind`.
///
/// Returns how many files were deleted. A missing directory counts as
/// nothing to do.
///
/// # Errors
///
/// Returns an I/O error if listing or deleting fails.
pub fn cleanup_storage_kind(base: &Path, kind: &str, log_id: &str) -> CoreResult<usize> {
    let removed = remove_versions(&base.join(kind), log_id, |_| true)?;
    Ok(removed.len())
}

/// Deletes `<dir>/<log_id>.<n>` for every `n` accepted by `doomed`.
fn remove_versions(dir: &Path, log_id: &str, doomed: impl Fn(u32) -> bool) -> CoreResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let prefix = format!("{log_id}.");
    let mut removed = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(version) = name
            .to_str()
            .and_then(|n| n.strip_prefix(&prefix))
            .and_then(|v| v.parse::<u32>().ok())
        else {
            continue;
        };
        if doomed(version) {
            let path = entry.path();
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "removed index table");
            removed.push(path);
        }
    }
    Ok(removed)
}

/// A locked table location for one session.
///
/// Holding an `IndexDir` holds an exclusive advisory lock on
/// `<base>/<kind>/<log_id>.lock`; a second `IndexDir` for the same log id,
/// in this or another process, fails with [`CoreError::IndexLocked`]. The
/// lock is released on drop.
#[derive(Debug)]
pub struct IndexDir {
    base: PathBuf,
    kind: String,
    log_id: String,
    version: u32,
    _lock: File,
}

impl IndexDir {
    /// Locks the table location for `log_id`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::IndexNotFound`] if the table is missing and
    ///   `create_if_missing` is false
    /// - [`CoreError::IndexLocked`] if another session holds the lock
    /// - I/O errors creating the directory or lock file
    pub fn open(
        base: &Path,
        kind: &str,
        log_id: &str,
        version: u32,
        create_if_missing: bool,
    ) -> CoreResult<Self> {
        let table = table_path(base, kind, log_id, version);
        if !create_if_missing && !table.exists() {
            return Err(CoreError::IndexNotFound { path: table });
        }

        let dir = base.join(kind);
        fs::create_dir_all(&dir)?;

        let lock_path = dir.join(format!("{log_id}.lock"));
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        if lock.try_lock_exclusive().is_err() {
            return Err(CoreError::IndexLocked { path: lock_path });
        }

        Ok(Self {
            base: base.to_path_buf(),
            kind: kind.to_owned(),
            log_id: log_id.to_owned(),
            version,
            _lock: lock,
        })
    }

    /// The log id this location belongs to.
    #[must_use]
    pub fn log_id(&self) -> &str {
        &self.log_id
    }

    /// The table file of the current version.
    #[must_use]
    pub fn table_path(&self) -> PathBuf {
        table_path(&self.base, &self.kind, &self.log_id, self.version)
    }

    /// Deletes tables of this log id written under other versions.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if listing or deleting fails.
    pub fn cleanup_stale_versions(&self) -> CoreResult<Vec<PathBuf>> {
        let current = self.version;
        remove_versions(&self.base.join(&self.kind), &self.log_id, |v| v != current)
    }

    /// Deletes this log id's tables under another storage kind.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if listing or deleting fails.
    pub fn cleanup_kind(&self, kind: &str) -> CoreResult<usize> {
        cleanup_storage_kind(&self.base, kind, &self.log_id)
    }

    /// Deletes the current table so it can be recreated.
    ///
    /// # Errors
    ///
    /// Returns an I/O error other than the file already being gone.
    pub fn remove_table(&self) -> CoreResult<()> {
        match fs::remove_file(self.table_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
