//! Benchmark utilities shared by the commitmap benches.

use commitmap_core::{
    CollectingReporter, Hash, HashIndex, PersistentHashIndex, RepoRoot, RootRegistry, HASH_LEN,
};
use commitmap_storage::InMemoryBackend;
use rand::Rng;

/// Roots used by every benchmark index.
pub const ROOTS: [&str; 4] = ["/bench/app", "/bench/lib", "/bench/docs", "/bench/tools"];

/// Generates `count` random hashes.
pub fn random_hashes(count: usize) -> Vec<Hash> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let mut bytes = [0u8; HASH_LEN];
            rng.fill(&mut bytes[..]);
            Hash::new(bytes)
        })
        .collect()
}

/// Pairs each hash with one of [`ROOTS`], round robin.
pub fn random_commits(count: usize) -> Vec<(Hash, RepoRoot)> {
    random_hashes(count)
        .into_iter()
        .enumerate()
        .map(|(i, hash)| (hash, RepoRoot::new(ROOTS[i % ROOTS.len()])))
        .collect()
}

/// Opens an in-memory index over [`ROOTS`].
pub fn in_memory_index() -> PersistentHashIndex {
    PersistentHashIndex::with_backend(
        RootRegistry::new(ROOTS),
        Box::new(InMemoryBackend::new()),
        CollectingReporter::new(),
    )
    .expect("in-memory index opens")
}

/// Opens an in-memory index holding `commits`.
pub fn populated_index(commits: &[(Hash, RepoRoot)]) -> PersistentHashIndex {
    let index = in_memory_index();
    for (hash, root) in commits {
        index.commit_index(hash, root);
    }
    index
}
