//! The commit hash index contract and its implementations.

mod empty;
mod persistent;

pub use empty::EmptyHashIndex;
pub use persistent::PersistentHashIndex;

use crate::commit::{CommitId, CommitIndex};
use crate::hash::Hash;
use crate::root::RepoRoot;

/// Maps commits to compact indices and back.
///
/// None of these operations fail from the caller's point of view. Storage
/// errors go to the implementation's [`crate::ErrorReporter`] and the call
/// answers with [`CommitIndex::NO_INDEX`] or `None`, meaning "not available
/// right now", never "does not exist".
pub trait HashIndex: Send + Sync {
    /// Returns the permanent index of `(hash, root)`, assigning one if the
    /// commit is new.
    fn commit_index(&self, hash: &Hash, root: &RepoRoot) -> CommitIndex;

    /// Returns the commit stored under `index`.
    fn commit_id(&self, index: CommitIndex) -> Option<CommitId>;

    /// Returns the first stored commit, in index order, matching
    /// `predicate`. Meant for small ad-hoc queries.
    fn find_commit_id(&self, predicate: &dyn Fn(&CommitId) -> bool) -> Option<CommitId>;

    /// Makes every assigned index durable.
    fn flush(&self);
}
