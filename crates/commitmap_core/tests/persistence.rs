//! End-to-end tests of the on-disk commit index.

use commitmap_core::{
    summarize, table_path, CollectingReporter, CommitId, CommitIdDescriptor, CommitIndex, Config,
    CoreError, Hash, HashIndex, PersistentHashIndex, RepoRoot, HASH_LEN, HEADER_LEN, STORAGE_KIND,
};
use commitmap_storage::FileBackend;
use proptest::prelude::*;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

const ROOTS: [&str; 2] = ["/work/app", "/work/lib"];

fn hash(n: u32) -> Hash {
    let mut bytes = [0u8; HASH_LEN];
    bytes[..4].copy_from_slice(&n.to_be_bytes());
    bytes[HASH_LEN - 1] = 0x5a;
    Hash::new(bytes)
}

fn open(config: Config) -> (PersistentHashIndex, CollectingReporter) {
    let reporter = CollectingReporter::new();
    let index = PersistentHashIndex::open(&config, "project", ROOTS, reporter.clone()).unwrap();
    (index, reporter)
}

#[test]
fn indices_survive_restart() {
    let base = tempdir().unwrap();
    let app = RepoRoot::new(ROOTS[0]);
    let lib = RepoRoot::new(ROOTS[1]);

    let before: Vec<CommitIndex> = {
        let (index, reporter) = open(Config::new(base.path()));
        let ids = (0..100)
            .map(|n| index.commit_index(&hash(n), if n % 2 == 0 { &app } else { &lib }))
            .collect();
        index.flush();
        index.dispose();
        assert!(reporter.is_empty());
        ids
    };

    let (index, reporter) = open(Config::new(base.path()));
    assert_eq!(index.len(), 100);
    for (n, expected) in (0..100).zip(&before) {
        let root = if n % 2 == 0 { &app } else { &lib };
        assert_eq!(index.commit_index(&hash(n), root), *expected);
        assert_eq!(index.commit_id(*expected), Some(CommitId::new(hash(n), root.clone())));
    }
    assert_eq!(index.commit_index(&hash(1000), &app), CommitIndex::new(100));
    assert!(reporter.is_empty());
}

#[test]
fn drop_releases_lock_and_keeps_data() {
    let base = tempdir().unwrap();
    {
        let (index, _) = open(Config::new(base.path()));
        index.commit_index(&hash(1), &RepoRoot::new(ROOTS[0]));
        index.flush();
    }

    let (index, _) = open(Config::new(base.path()));
    assert_eq!(index.len(), 1);
}

#[test]
fn second_session_is_locked_out() {
    let base = tempdir().unwrap();
    let (first, _) = open(Config::new(base.path()));

    let err = PersistentHashIndex::open(
        &Config::new(base.path()),
        "project",
        ROOTS,
        CollectingReporter::new(),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::IndexLocked { .. }));

    first.dispose();
    PersistentHashIndex::open(&Config::new(base.path()), "project", ROOTS, CollectingReporter::new())
        .unwrap();
}

#[test]
fn root_order_does_not_change_table_or_numbering() {
    let base = tempdir().unwrap();
    let first = {
        let (index, _) = open(Config::new(base.path()));
        let idx = index.commit_index(&hash(1), &RepoRoot::new(ROOTS[1]));
        index.flush();
        idx
    };

    let reversed = [ROOTS[1], ROOTS[0]];
    let index = PersistentHashIndex::open(
        &Config::new(base.path()),
        "project",
        reversed,
        CollectingReporter::new(),
    )
    .unwrap();
    assert_eq!(index.commit_index(&hash(1), &RepoRoot::new(ROOTS[1])), first);
    assert_eq!(index.registry().index_of(&RepoRoot::new(ROOTS[0])), Some(0));
}

#[test]
fn changed_root_set_uses_a_separate_table() {
    let base = tempdir().unwrap();
    {
        let (index, _) = open(Config::new(base.path()));
        index.commit_index(&hash(1), &RepoRoot::new(ROOTS[0]));
        index.flush();
    }

    let index = PersistentHashIndex::open(
        &Config::new(base.path()),
        "project",
        [ROOTS[0], ROOTS[1], "/work/docs"],
        CollectingReporter::new(),
    )
    .unwrap();
    assert!(index.is_empty());
}

#[test]
fn version_bump_starts_fresh_and_removes_old_table() {
    let base = tempdir().unwrap();
    let old_path = {
        let (index, _) = open(Config::new(base.path()).version(3));
        index.commit_index(&hash(1), &RepoRoot::new(ROOTS[0]));
        index.flush();
        index.table_path().unwrap().to_path_buf()
    };
    assert!(old_path.exists());

    let (index, _) = open(Config::new(base.path()).version(4));
    assert!(index.is_empty());
    assert!(!old_path.exists());
    let new_path = index.table_path().unwrap();
    assert_eq!(new_path.extension().unwrap(), "4");
    assert_eq!(new_path.file_stem(), old_path.file_stem());
}

/// Flips one byte of the first record's key.
fn damage_first_record(path: &Path) {
    let mut bytes = fs::read(path).unwrap();
    bytes[HEADER_LEN as usize + 6] ^= 0xFF;
    fs::write(path, bytes).unwrap();
}

#[test]
fn corrupt_table_is_rebuilt_by_default() {
    let base = tempdir().unwrap();
    let path = {
        let (index, _) = open(Config::new(base.path()));
        index.commit_index(&hash(1), &RepoRoot::new(ROOTS[0]));
        index.flush();
        index.table_path().unwrap().to_path_buf()
    };
    damage_first_record(&path);

    let (index, reporter) = open(Config::new(base.path()));
    assert!(index.is_empty());
    assert_eq!(
        index.commit_index(&hash(2), &RepoRoot::new(ROOTS[0])),
        CommitIndex::new(0)
    );
    assert!(reporter.is_empty());
}

#[test]
fn corrupt_table_fails_open_when_rebuild_is_off() {
    let base = tempdir().unwrap();
    let path = {
        let (index, _) = open(Config::new(base.path()));
        index.commit_index(&hash(1), &RepoRoot::new(ROOTS[0]));
        index.flush();
        index.table_path().unwrap().to_path_buf()
    };
    damage_first_record(&path);

    let err = PersistentHashIndex::open(
        &Config::new(base.path()).recreate_on_corruption(false),
        "project",
        ROOTS,
        CollectingReporter::new(),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::ChecksumMismatch { .. }));
    assert!(path.exists());
}

#[test]
fn torn_tail_is_dropped_on_reopen() {
    let base = tempdir().unwrap();
    let path = {
        let (index, _) = open(Config::new(base.path()));
        for n in 0..3 {
            index.commit_index(&hash(n), &RepoRoot::new(ROOTS[0]));
        }
        index.flush();
        index.table_path().unwrap().to_path_buf()
    };
    let intact = fs::metadata(&path).unwrap().len();
    OpenOptions::new()
        .append(true)
        .open(&path)
        .unwrap()
        .write_all(&[32, 0, 0, 0, 1, 2, 3])
        .unwrap();

    let (index, reporter) = open(Config::new(base.path()));
    assert_eq!(index.len(), 3);
    assert_eq!(fs::metadata(&path).unwrap().len(), intact);
    assert_eq!(
        index.commit_index(&hash(3), &RepoRoot::new(ROOTS[0])),
        CommitIndex::new(3)
    );
    assert!(reporter.is_empty());
}

#[test]
fn damaged_length_mid_table_never_frees_indices() {
    let base = tempdir().unwrap();
    let path = {
        let (index, _) = open(Config::new(base.path()));
        for n in 0..4 {
            index.commit_index(&hash(n), &RepoRoot::new(ROOTS[1]));
        }
        index.flush();
        index.table_path().unwrap().to_path_buf()
    };
    let mut bytes = fs::read(&path).unwrap();
    let len_at = HEADER_LEN as usize + 32;
    bytes[len_at..len_at + 4].copy_from_slice(&4096u32.to_le_bytes());
    fs::write(&path, &bytes).unwrap();

    let err = PersistentHashIndex::open(
        &Config::new(base.path()).recreate_on_corruption(false),
        "project",
        ROOTS,
        CollectingReporter::new(),
    )
    .unwrap_err();
    assert!(err.is_corruption());
    assert_eq!(fs::read(&path).unwrap(), bytes);
}

#[test]
fn missing_table_without_create_is_not_found() {
    let base = tempdir().unwrap();
    let err = PersistentHashIndex::open(
        &Config::new(base.path()).create_if_missing(false),
        "project",
        ROOTS,
        CollectingReporter::new(),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::IndexNotFound { .. }));
}

#[test]
fn legacy_root_tables_are_cleaned_up() {
    let base = tempdir().unwrap();
    let (index, _) = open(Config::new(base.path()));
    let log_id = index
        .table_path()
        .unwrap()
        .file_stem()
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    index.dispose();

    let legacy = base.path().join("roots");
    fs::create_dir_all(&legacy).unwrap();
    fs::write(legacy.join(format!("{log_id}.0")), b"old").unwrap();

    let _reopened = open(Config::new(base.path()));
    assert!(!legacy.join(format!("{log_id}.0")).exists());
}

#[test]
fn flush_without_sync_still_persists_on_clean_close() {
    let base = tempdir().unwrap();
    {
        let (index, reporter) = open(Config::new(base.path()).sync_on_flush(false));
        index.commit_index(&hash(9), &RepoRoot::new(ROOTS[1]));
        index.flush();
        assert!(reporter.is_empty());
    }

    let (index, _) = open(Config::new(base.path()));
    assert_eq!(index.len(), 1);
}

#[test]
fn concurrent_lookups_assign_one_index_per_commit() {
    let base = tempdir().unwrap();
    let (index, reporter) = open(Config::new(base.path()));
    let index = Arc::new(index);

    let handles: Vec<_> = (0..8u32)
        .map(|t| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                let root = RepoRoot::new(ROOTS[(t % 2) as usize]);
                (0..200u32)
                    .map(|n| {
                        let n = (n * 7 + t) % 200;
                        (n, index.commit_index(&hash(n), &root))
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut per_commit = std::collections::HashMap::new();
    for (t, handle) in handles.into_iter().enumerate() {
        for (n, idx) in handle.join().unwrap() {
            assert!(idx.is_valid());
            let prev = per_commit.insert((n, t % 2), idx);
            if let Some(prev) = prev {
                assert_eq!(prev, idx);
            }
        }
    }

    assert_eq!(index.len(), 400);
    let distinct: HashSet<_> = per_commit.values().collect();
    assert_eq!(distinct.len(), 400);
    assert!(reporter.is_empty());

    index.flush();
    let path = index.table_path().unwrap().to_path_buf();
    let backend = FileBackend::open_read_only(&path).unwrap();
    let summary = summarize(&backend, Some(CommitIdDescriptor::KEY_LEN)).unwrap();
    assert_eq!(summary.records, 400);
    assert_eq!(summary.torn_at, None);
}

#[test]
fn table_lives_under_storage_kind() {
    let base = tempdir().unwrap();
    let (index, _) = open(Config::new(base.path()));
    let path = index.table_path().unwrap();
    let file_name = path.file_name().unwrap().to_str().unwrap();
    let log_id = file_name.strip_suffix(".3").unwrap();
    assert_eq!(path, table_path(base.path(), STORAGE_KIND, log_id, 3));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn lookups_are_idempotent_and_reversible(
        commits in prop::collection::vec((any::<[u8; HASH_LEN]>(), 0usize..2), 1..40)
    ) {
        let base = tempdir().unwrap();
        let (index, reporter) = open(Config::new(base.path()));

        let assigned: Vec<(CommitId, CommitIndex)> = commits
            .iter()
            .map(|(bytes, root)| {
                let commit = CommitId::new(Hash::new(*bytes), ROOTS[*root]);
                let idx = index.commit_index(commit.hash(), commit.root());
                (commit, idx)
            })
            .collect();

        let distinct: HashSet<&CommitId> = assigned.iter().map(|(c, _)| c).collect();
        prop_assert_eq!(index.len(), distinct.len());

        for (commit, idx) in &assigned {
            prop_assert!(idx.as_u32() < distinct.len() as u32);
            prop_assert_eq!(index.commit_index(commit.hash(), commit.root()), *idx);
            let stored = index.commit_id(*idx);
            prop_assert_eq!(stored.as_ref(), Some(commit));
        }
        prop_assert!(reporter.is_empty());
    }

    #[test]
    fn find_matches_exactly_one_entry(count in 1u32..30, pick in 0u32..30) {
        let base = tempdir().unwrap();
        let (index, _) = open(Config::new(base.path()));
        let root = RepoRoot::new(ROOTS[0]);
        for n in 0..count {
            index.commit_index(&hash(n), &root);
        }

        let target = hash(pick);
        let found = index.find_commit_id(&|c| c.hash() == &target);
        if pick < count {
            prop_assert_eq!(found, Some(CommitId::new(target, root.clone())));
        } else {
            prop_assert_eq!(found, None);
        }
    }
}
