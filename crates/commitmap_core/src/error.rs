//! Error types for the commit index.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised inside the index.
///
/// Only the enumerator and the open path return these directly. The
/// [`crate::HashIndex`] operations hand them to an
/// [`crate::ErrorReporter`] instead.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] commitmap_storage::StorageError),

    /// I/O error outside the backend (directories, lock files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A hash string or byte slice was malformed.
    #[error("invalid hash: {message}")]
    InvalidHash {
        /// What was wrong with it.
        message: String,
    },

    /// A root that is not part of the registry.
    #[error("root is not registered: {}", path.display())]
    UnknownRoot {
        /// The offending root.
        path: PathBuf,
    },

    /// A stored root index that points outside the registry.
    #[error("root index {index} out of range, registry holds {len} roots")]
    RootIndexOutOfRange {
        /// The decoded index.
        index: u32,
        /// Registry size.
        len: usize,
    },

    /// Reverse lookup of an index that was never assigned.
    #[error("unknown commit index: {0}")]
    UnknownCommitIndex(u32),

    /// The table file is not something we wrote.
    #[error("invalid index format: {message}")]
    InvalidFormat {
        /// Description of the problem.
        message: String,
    },

    /// Checksum mismatch in a header or record.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the damaged record.
        offset: u64,
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// The table was written under a different schema version.
    #[error("index version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version the caller asked for.
        expected: u32,
        /// Version in the header.
        found: u32,
    },

    /// Every id below the sentinel has been handed out.
    #[error("index is full: {0} entries")]
    CapacityExhausted(u32),

    /// The table does not exist and creation was not requested.
    #[error("index not found: {}", path.display())]
    IndexNotFound {
        /// The expected table file.
        path: PathBuf,
    },

    /// Another session holds the table.
    #[error("index is locked by another session: {}", path.display())]
    IndexLocked {
        /// The lock file.
        path: PathBuf,
    },

    /// The index was already disposed.
    #[error("index is closed")]
    Closed,
}

impl CoreError {
    /// Creates an invalid hash error.
    pub fn invalid_hash(message: impl Into<String>) -> Self {
        Self::InvalidHash {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Whether the on-disk generation is unreadable and should be rebuilt.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat { .. } | Self::ChecksumMismatch { .. } | Self::VersionMismatch { .. }
        )
    }
}
