//! An index that stores nothing.

use super::HashIndex;
use crate::commit::{CommitId, CommitIndex};
use crate::hash::Hash;
use crate::root::RepoRoot;

/// Stand-in used when there is no project or root context to index.
///
/// Never stores anything: every lookup is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyHashIndex;

impl HashIndex for EmptyHashIndex {
    fn commit_index(&self, _hash: &Hash, _root: &RepoRoot) -> CommitIndex {
        CommitIndex::NO_INDEX
    }

    fn commit_id(&self, _index: CommitIndex) -> Option<CommitId> {
        None
    }

    fn find_commit_id(&self, _predicate: &dyn Fn(&CommitId) -> bool) -> Option<CommitId> {
        None
    }

    fn flush(&self) {}
}
