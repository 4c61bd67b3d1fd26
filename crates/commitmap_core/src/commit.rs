//! Commit identities and their compact indices.

use crate::hash::Hash;
use crate::root::RepoRoot;
use std::fmt;

/// A commit: its hash plus the repository root it lives in.
///
/// The same hash under two roots is two different commits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitId {
    hash: Hash,
    root: RepoRoot,
}

impl CommitId {
    /// Creates a commit identity.
    pub fn new(hash: Hash, root: impl Into<RepoRoot>) -> Self {
        Self {
            hash,
            root: root.into(),
        }
    }

    /// The content hash.
    #[must_use]
    pub const fn hash(&self) -> &Hash {
        &self.hash
    }

    /// The repository root.
    #[must_use]
    pub const fn root(&self) -> &RepoRoot {
        &self.root
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.hash.to_short_string(), self.root)
    }
}

/// The small integer standing in for a [`CommitId`].
///
/// Indices are dense, start at 0 and are never reused.
/// [`CommitIndex::NO_INDEX`] is never assigned; it means the lookup could not
/// be served this time, not that the commit is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitIndex(u32);

impl CommitIndex {
    /// Sentinel returned when storage failed.
    pub const NO_INDEX: Self = Self(u32::MAX);

    /// Wraps a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Whether this is a real index rather than the sentinel.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Display for CommitIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            f.write_str("#none")
        }
    }
}
