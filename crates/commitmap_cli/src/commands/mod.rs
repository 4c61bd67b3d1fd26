//! CLI command implementations.

pub mod dump;
pub mod find;
pub mod inspect;
pub mod verify;

use clap::{Args, ValueEnum};
use commitmap_core::{
    calc_log_id, table_path, walk_table, CommitId, CommitIdDescriptor, CommitIndex, CoreError,
    RootRegistry, TableSummary, STORAGE_KIND, VERSION,
};
use commitmap_storage::FileBackend;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Error from the index.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from a storage backend.
    #[error(transparent)]
    Storage(#[from] commitmap_storage::StorageError),

    /// JSON output failed.
    #[error("json output: {0}")]
    Json(#[from] serde_json::Error),

    /// The table file does not exist.
    #[error("no table found at {0}")]
    MissingTable(PathBuf),

    /// A hash prefix was not hexadecimal or too long.
    #[error("invalid hash prefix '{0}'")]
    InvalidPrefix(String),

    /// A table failed verification.
    #[error("verification failed for {0}")]
    VerificationFailed(PathBuf),
}

/// Result alias for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Output format for commands that print data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Arguments identifying an index session.
#[derive(Debug, Clone, Args)]
pub struct SessionArgs {
    /// Base directory holding the index storage
    #[arg(short, long)]
    pub base: PathBuf,

    /// Project name the index was created for
    #[arg(long)]
    pub project: String,

    /// Repository root of the project (repeat for each root)
    #[arg(short, long = "root", required = true)]
    pub roots: Vec<PathBuf>,
}

impl SessionArgs {
    /// The session's roots, numbered as the index numbers them.
    pub fn registry(&self) -> RootRegistry {
        RootRegistry::new(self.roots.iter().map(PathBuf::as_path))
    }

    /// Path of the session's current table.
    pub fn table_path(&self) -> PathBuf {
        let log_id = calc_log_id(&self.project, &self.registry());
        table_path(&self.base, STORAGE_KIND, &log_id, VERSION)
    }

    /// Decodes the session's table in index order without opening a
    /// session: no lock is taken, and stale generations, legacy tables and
    /// torn tails are left on disk.
    pub fn walk<F>(&self, mut visit: F) -> CliResult<TableSummary>
    where
        F: FnMut(CommitIndex, CommitId) -> bool,
    {
        let path = self.table_path();
        require_file(&path)?;
        let backend = FileBackend::open_read_only(&path)?;
        let descriptor = CommitIdDescriptor::new(Arc::new(self.registry()));

        let summary = walk_table(&backend, &descriptor, VERSION, |id, commit| {
            visit(CommitIndex::new(id), commit)
        })?;
        if let Some(offset) = summary.torn_at {
            warn!(offset, path = %path.display(), "table ends in an incomplete record");
        }
        Ok(summary)
    }
}

/// One stored commit, as printed by `dump` and `find`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRow {
    /// Dense commit index.
    pub index: u32,
    /// Full hex hash.
    pub hash: String,
    /// Repository root.
    pub root: String,
}

impl CommitRow {
    /// Builds a row from an index entry.
    pub fn new(index: CommitIndex, commit: &CommitId) -> Self {
        Self {
            index: index.as_u32(),
            hash: commit.hash().to_hex(),
            root: commit.root().path().display().to_string(),
        }
    }
}

/// Prints rows in the requested format.
pub fn print_rows(rows: &[CommitRow], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
        OutputFormat::Text => {
            for row in rows {
                println!("{:>8} {} {}", row.index, row.hash, row.root);
            }
        }
    }
    Ok(())
}

fn require_file(path: &Path) -> CliResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CliError::MissingTable(path.to_path_buf()))
    }
}

/// Formats a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use commitmap_core::Hash;

    #[test]
    fn commit_row_uses_full_hex() {
        let commit = CommitId::new(Hash::new([0xab; 20]), "/repo");
        let row = CommitRow::new(CommitIndex::new(3), &commit);
        assert_eq!(row.index, 3);
        assert_eq!(row.hash, "ab".repeat(20));
        assert_eq!(row.root, "/repo");
    }

    #[test]
    fn rows_serialize_as_objects() {
        let rows = vec![CommitRow {
            index: 0,
            hash: "00".repeat(20),
            root: "/r".into(),
        }];
        let json = serde_json::to_value(&rows).unwrap();
        assert_eq!(json[0]["index"], 0);
        assert_eq!(json[0]["root"], "/r");
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn missing_session_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let args = test_support::session(dir.path());
        assert!(matches!(args.walk(|_, _| true), Err(CliError::MissingTable(_))));
        assert!(!args.table_path().exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn walk_leaves_every_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let args = test_support::session(dir.path());
        test_support::populate(&args, 3);

        let table = args.table_path();
        let stale = table.with_extension("2");
        let legacy = dir.path().join("roots").join(table.file_name().unwrap());
        std::fs::write(&stale, b"old generation").unwrap();
        std::fs::create_dir_all(legacy.parent().unwrap()).unwrap();
        std::fs::write(&legacy, b"old roots").unwrap();
        let mut torn = std::fs::OpenOptions::new().append(true).open(&table).unwrap();
        std::io::Write::write_all(&mut torn, &[32, 0, 0]).unwrap();
        drop(torn);
        let before = std::fs::read(&table).unwrap();

        let mut seen = 0;
        let summary = args
            .walk(|_, _| {
                seen += 1;
                true
            })
            .unwrap();
        assert_eq!(seen, 3);
        assert!(summary.torn_at.is_some());

        assert_eq!(std::fs::read(&table).unwrap(), before);
        assert!(stale.exists());
        assert!(legacy.exists());
    }

    #[test]
    fn walk_does_not_need_the_session_lock() {
        let dir = tempfile::tempdir().unwrap();
        let args = test_support::session(dir.path());
        test_support::populate(&args, 2);

        let _live = test_support::open_session(&args);
        let mut seen = 0;
        args.walk(|_, _| {
            seen += 1;
            true
        })
        .unwrap();
        assert_eq!(seen, 2);
    }
}
