//! # commitmap core
//!
//! Persistent mapping between commits and compact integer indices.
//!
//! A commit is a content [`Hash`] plus the [`RepoRoot`] it belongs to. Log
//! caches refer to commits by a dense [`CommitIndex`] instead, which this
//! crate assigns, persists and resolves back.
//!
//! - [`PersistentHashIndex`] - the on-disk index for one project session
//! - [`EmptyHashIndex`] - a stand-in when there is nothing to index
//! - [`PersistentEnumerator`] - the generic insert-if-absent table under it
//!
//! Index operations never fail from the caller's point of view: storage
//! errors go to an [`ErrorReporter`] and the call returns
//! [`CommitIndex::NO_INDEX`] or `None`.
//!
//! ```rust
//! use commitmap_core::{CollectingReporter, HashIndex, PersistentHashIndex, RepoRoot, RootRegistry};
//! use commitmap_storage::InMemoryBackend;
//!
//! let index = PersistentHashIndex::with_backend(
//!     RootRegistry::new(["/repo"]),
//!     Box::new(InMemoryBackend::new()),
//!     CollectingReporter::new(),
//! ).unwrap();
//!
//! let hash = "da39a3ee5e6b4b0d3255bfef95601890afd80709".parse().unwrap();
//! let root = RepoRoot::new("/repo");
//! let idx = index.commit_index(&hash, &root);
//! assert_eq!(index.commit_index(&hash, &root), idx);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod commit;
mod config;
mod crc;
mod dir;
mod enumerator;
mod error;
mod hash;
mod index;
mod reporter;
mod root;

pub use commit::{CommitId, CommitIndex};
pub use config::Config;
pub use dir::{
    calc_log_id, cleanup_storage_kind, table_path, IndexDir, LEGACY_ROOTS_KIND, STORAGE_KIND,
    VERSION,
};
pub use enumerator::{
    summarize, walk_table, CommitIdDescriptor, KeyDescriptor, PersistentEnumerator,
    RawKeyDescriptor, TableSummary, FORMAT_VERSION, HEADER_LEN, MAGIC,
};
pub use error::{CoreError, CoreResult};
pub use hash::{Hash, HASH_LEN};
pub use index::{EmptyHashIndex, HashIndex, PersistentHashIndex};
pub use reporter::{CollectingReporter, ErrorReporter, LogReporter};
pub use root::{RepoRoot, RootRegistry};

/// Crate version.
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");
