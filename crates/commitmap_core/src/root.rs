//! Repository roots and the registry that numbers them.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A repository root, identified by its path.
///
/// Paths are stored in component form: a trailing separator, repeated
/// separators and `.` segments are dropped, so `/repo/` and `/repo` are the
/// same root and also render the same.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoRoot(PathBuf);

impl RepoRoot {
    /// Wraps a path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(normalize(&path.into()))
    }

    /// The root's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Key used for the registry's canonical ordering.
    fn sort_key(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }
}

impl fmt::Display for RepoRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

impl From<PathBuf> for RepoRoot {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for RepoRoot {
    fn from(path: &Path) -> Self {
        Self(normalize(path))
    }
}

impl From<&str> for RepoRoot {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for RepoRoot {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

/// The ordered, deduplicated set of roots of one index generation.
///
/// Roots are sorted by their path string; a root's position is the 4-byte
/// number written next to every hash on disk. The order is only stable for
/// a fixed root set, which is why the root set also feeds the table's log
/// id (see [`crate::calc_log_id`]).
#[derive(Debug, Clone, Default)]
pub struct RootRegistry {
    roots: Vec<RepoRoot>,
    positions: HashMap<RepoRoot, u32>,
}

impl RootRegistry {
    /// Sorts and deduplicates `roots`.
    pub fn new<I, R>(roots: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RepoRoot>,
    {
        let mut roots: Vec<RepoRoot> = roots.into_iter().map(Into::into).collect();
        roots.sort_by_cached_key(RepoRoot::sort_key);
        roots.dedup();

        let positions = roots
            .iter()
            .enumerate()
            .map(|(i, root)| (root.clone(), i as u32))
            .collect();

        Self { roots, positions }
    }

    /// Position of `root`, if registered.
    #[must_use]
    pub fn index_of(&self, root: &RepoRoot) -> Option<u32> {
        self.positions.get(root).copied()
    }

    /// Root at `index`.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&RepoRoot> {
        self.roots.get(index as usize)
    }

    /// Roots in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &RepoRoot> {
        self.roots.iter()
    }

    /// Number of roots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Whether no root is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_by_path_and_deduplicated() {
        let registry = RootRegistry::new(["/work/b", "/work/a", "/work/b", "/alpha"]);
        let paths: Vec<String> = registry.iter().map(ToString::to_string).collect();
        assert_eq!(paths, ["/alpha", "/work/a", "/work/b"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn trailing_separators_name_the_same_root() {
        let registry = RootRegistry::new(["/work/a", "/work/a-x", "/work/a/", "/work//a-x/./"]);
        let paths: Vec<String> = registry.iter().map(ToString::to_string).collect();
        assert_eq!(paths, ["/work/a", "/work/a-x"]);
        assert_eq!(registry.index_of(&RepoRoot::new("/work/a")), Some(0));
        assert_eq!(registry.index_of(&RepoRoot::new("/work/a/")), Some(0));
        assert_eq!(registry.index_of(&RepoRoot::new("/work/a-x")), Some(1));
    }

    #[test]
    fn root_paths_are_normalized() {
        assert_eq!(RepoRoot::new("/repo/"), RepoRoot::new("/repo"));
        assert_eq!(RepoRoot::from("/repo//sub/."), RepoRoot::new("/repo/sub"));
        assert_eq!(RepoRoot::new("/repo/").to_string(), "/repo");
    }

    #[test]
    fn positions_follow_order() {
        let registry = RootRegistry::new(["/z", "/m", "/a"]);
        assert_eq!(registry.index_of(&RepoRoot::new("/a")), Some(0));
        assert_eq!(registry.index_of(&RepoRoot::new("/z")), Some(2));
        assert_eq!(registry.index_of(&RepoRoot::new("/other")), None);
        assert_eq!(registry.get(1), Some(&RepoRoot::new("/m")));
        assert_eq!(registry.get(3), None);
    }

    #[test]
    fn input_order_does_not_matter() {
        let one = RootRegistry::new(["/b", "/a", "/c"]);
        let two = RootRegistry::new(["/c", "/b", "/a"]);
        assert!(one.iter().eq(two.iter()));
    }

    #[test]
    fn empty_registry() {
        let registry = RootRegistry::new(Vec::<PathBuf>::new());
        assert!(registry.is_empty());
        assert_eq!(registry.get(0), None);
    }
}
