//! The on-disk commit hash index.

use super::HashIndex;
use crate::commit::{CommitId, CommitIndex};
use crate::config::Config;
use crate::dir::{calc_log_id, IndexDir, LEGACY_ROOTS_KIND, STORAGE_KIND, VERSION};
use crate::enumerator::{CommitIdDescriptor, PersistentEnumerator};
use crate::error::{CoreError, CoreResult};
use crate::hash::Hash;
use crate::reporter::ErrorReporter;
use crate::root::{RepoRoot, RootRegistry};
use commitmap_storage::{FileBackend, StorageBackend};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

type CommitTable = PersistentEnumerator<CommitId, CommitIdDescriptor>;

/// Persistent `(hash, root) <-> index` mapping for one project session.
///
/// Open it once per session, share it between threads, and dispose it (or
/// drop it) when the session ends. Indices survive restarts as long as the
/// project name, root set and [`Config::version`] stay the same.
///
/// # Example
///
/// ```rust
/// use commitmap_core::{Config, Hash, HashIndex, LogReporter, PersistentHashIndex, RepoRoot};
///
/// let base = tempfile::tempdir().unwrap();
/// let index = PersistentHashIndex::open(
///     &Config::new(base.path()),
///     "demo",
///     ["/src/app"],
///     LogReporter,
/// ).unwrap();
///
/// let hash: Hash = "0123456789abcdef0123456789abcdef01234567".parse().unwrap();
/// let root = RepoRoot::new("/src/app");
/// let idx = index.commit_index(&hash, &root);
/// assert_eq!(index.commit_id(idx).unwrap().hash(), &hash);
/// index.flush();
/// ```
pub struct PersistentHashIndex {
    table: CommitTable,
    reporter: Box<dyn ErrorReporter>,
    /// Holds the session lock; `None` for backend-only indexes and after
    /// dispose.
    dir: Mutex<Option<IndexDir>>,
    table_path: Option<PathBuf>,
    sync_on_flush: bool,
}

impl PersistentHashIndex {
    /// Opens (or creates) the table for `project_name` and `roots` under
    /// `config.base_dir`.
    ///
    /// Tables of other versions for the same project and root set are
    /// deleted, as are leftovers of the legacy root table. An unreadable
    /// table is rebuilt empty if [`Config::recreate_on_corruption`] is set.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexLocked`] if another session has the table
    /// open, [`CoreError::IndexNotFound`] if it is missing and creation is
    /// off, and I/O or format errors otherwise.
    pub fn open<I, R, E>(config: &Config, project_name: &str, roots: I, reporter: E) -> CoreResult<Self>
    where
        I: IntoIterator<Item = R>,
        R: Into<RepoRoot>,
        E: ErrorReporter + 'static,
    {
        let registry = Arc::new(RootRegistry::new(roots));
        let log_id = calc_log_id(project_name, &registry);
        let dir = IndexDir::open(
            &config.base_dir,
            STORAGE_KIND,
            &log_id,
            config.version,
            config.create_if_missing,
        )?;

        for stale in dir.cleanup_stale_versions()? {
            debug!(path = %stale.display(), "removed stale index generation");
        }
        dir.cleanup_kind(LEGACY_ROOTS_KIND)?;

        let path = dir.table_path();
        let table = match open_table(&path, &registry, config.version) {
            Ok(table) => table,
            Err(err) if err.is_corruption() && config.recreate_on_corruption => {
                warn!(path = %path.display(), error = %err, "rebuilding unreadable commit index");
                dir.remove_table()?;
                open_table(&path, &registry, config.version)?
            }
            Err(err) => return Err(err),
        };

        debug!(
            log_id = %log_id,
            roots = registry.len(),
            entries = table.len(),
            "opened commit index"
        );
        Ok(Self {
            table,
            reporter: Box::new(reporter),
            dir: Mutex::new(Some(dir)),
            table_path: Some(path),
            sync_on_flush: config.sync_on_flush,
        })
    }

    /// Opens an index over an arbitrary backend at [`VERSION`], with no
    /// directory or lock.
    ///
    /// # Errors
    ///
    /// Returns the enumerator's open error.
    pub fn with_backend<E>(
        registry: RootRegistry,
        backend: Box<dyn StorageBackend>,
        reporter: E,
    ) -> CoreResult<Self>
    where
        E: ErrorReporter + 'static,
    {
        let descriptor = CommitIdDescriptor::new(Arc::new(registry));
        let table = PersistentEnumerator::open(backend, descriptor, VERSION)?;
        Ok(Self {
            table,
            reporter: Box::new(reporter),
            dir: Mutex::new(None),
            table_path: None,
            sync_on_flush: true,
        })
    }

    /// The roots this index numbers.
    #[must_use]
    pub fn registry(&self) -> &RootRegistry {
        self.table.descriptor().registry()
    }

    /// Number of stored commits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether no commit is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The table file, for indexes opened from a directory.
    #[must_use]
    pub fn table_path(&self) -> Option<&Path> {
        self.table_path.as_deref()
    }

    /// Looks up `commit` without assigning an index.
    ///
    /// `Ok(None)` means the commit has never been indexed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after dispose.
    pub fn existing_index(&self, commit: &CommitId) -> CoreResult<Option<CommitIndex>> {
        Ok(self.table.try_enumerate(commit)?.map(CommitIndex::new))
    }

    /// Visits every stored commit in index order until `visit` returns
    /// `false`. Returns whether the walk completed.
    ///
    /// Unlike [`HashIndex::find_commit_id`], errors are returned rather than
    /// reported.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] or a read/decode error.
    pub fn scan<F>(&self, mut visit: F) -> CoreResult<bool>
    where
        F: FnMut(CommitIndex, &CommitId) -> bool,
    {
        let mut next = 0u32;
        self.table.iterate_data(|commit| {
            let index = CommitIndex::new(next);
            next += 1;
            visit(index, commit)
        })
    }

    /// Releases the table and the session lock.
    ///
    /// Safe to call more than once. A failing final sync is logged, not
    /// returned.
    pub fn dispose(&self) {
        if let Err(err) = self.table.close() {
            warn!(error = %err, "failed to close commit index");
        }
        if self.dir.lock().take().is_some() {
            debug!("released commit index lock");
        }
    }

    /// Whether [`Self::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.table.is_closed()
    }

    fn report(&self, err: CoreError) {
        self.reporter.report(err);
    }
}

fn open_table(path: &Path, registry: &Arc<RootRegistry>, version: u32) -> CoreResult<CommitTable> {
    let backend = FileBackend::open_with_create_dirs(path)?;
    PersistentEnumerator::open(
        Box::new(backend),
        CommitIdDescriptor::new(Arc::clone(registry)),
        version,
    )
}

impl HashIndex for PersistentHashIndex {
    fn commit_index(&self, hash: &Hash, root: &RepoRoot) -> CommitIndex {
        match self.table.enumerate(&CommitId::new(*hash, root.clone())) {
            Ok(id) => CommitIndex::new(id),
            Err(err) => {
                self.report(err);
                CommitIndex::NO_INDEX
            }
        }
    }

    fn commit_id(&self, index: CommitIndex) -> Option<CommitId> {
        match self.table.value_of(index.as_u32()) {
            Ok(Some(commit)) => Some(commit),
            Ok(None) => {
                self.report(CoreError::UnknownCommitIndex(index.as_u32()));
                None
            }
            Err(err) => {
                self.report(err);
                None
            }
        }
    }

    fn find_commit_id(&self, predicate: &dyn Fn(&CommitId) -> bool) -> Option<CommitId> {
        let mut found = None;
        let scan = self.table.iterate_data(|commit| {
            if predicate(commit) {
                found = Some(commit.clone());
                false
            } else {
                true
            }
        });
        match scan {
            Ok(_) => found,
            Err(err) => {
                self.report(err);
                None
            }
        }
    }

    fn flush(&self) {
        let result = if self.sync_on_flush {
            self.table.force()
        } else {
            self.table.flush()
        };
        if let Err(err) = result {
            self.report(err);
        }
    }
}

impl Drop for PersistentHashIndex {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for PersistentHashIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentHashIndex")
            .field("table", &self.table)
            .field("table_path", &self.table_path)
            .field("roots", &self.registry().len())
            .finish_non_exhaustive()
    }
}
