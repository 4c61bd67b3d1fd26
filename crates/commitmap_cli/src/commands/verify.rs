//! Verify command implementation.

use super::{require_file, CliError, CliResult};
use commitmap_core::{summarize, CommitIdDescriptor};
use commitmap_storage::FileBackend;
use std::path::Path;

/// Verification result.
#[derive(Debug)]
pub struct VerifyResult {
    /// Number of records whose checksum matched.
    pub valid_records: usize,
    /// Offset of an incomplete trailing record.
    pub torn_at: Option<u64>,
    /// First integrity error, if any.
    pub error: Option<String>,
}

impl VerifyResult {
    /// Whether the table is intact. A torn tail is recoverable and passes.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Checks the header and every record checksum of the table at `path`.
///
/// Integrity problems land in [`VerifyResult::error`]; only I/O failures
/// are returned as errors.
pub fn verify(path: &Path) -> CliResult<VerifyResult> {
    require_file(path)?;
    let backend = FileBackend::open_read_only(path)?;

    match summarize(&backend, Some(CommitIdDescriptor::KEY_LEN)) {
        Ok(summary) => Ok(VerifyResult {
            valid_records: summary.records,
            torn_at: summary.torn_at,
            error: None,
        }),
        Err(err) if err.is_corruption() => Ok(VerifyResult {
            valid_records: 0,
            torn_at: None,
            error: Some(err.to_string()),
        }),
        Err(err) => Err(err.into()),
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> CliResult<()> {
    println!("Verifying table at {}", path.display());
    println!();

    let result = verify(path)?;
    println!("  Records verified: {}", result.valid_records);
    if let Some(offset) = result.torn_at {
        println!("  WARNING: incomplete record at offset {offset}");
    }
    if let Some(error) = &result.error {
        println!("  ERROR: {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Table verification passed");
        Ok(())
    } else {
        println!("✗ Table verification failed");
        Err(CliError::VerificationFailed(path.to_path_buf()))
    }
}
