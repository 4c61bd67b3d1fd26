//! Inspect command implementation.

use super::{format_size, require_file, CliResult, OutputFormat};
use commitmap_core::{summarize, CommitIdDescriptor};
use commitmap_storage::FileBackend;
use serde::Serialize;
use std::path::Path;

/// Table inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Table path.
    pub path: String,
    /// Schema version from the header.
    pub version: u32,
    /// Number of complete records.
    pub records: usize,
    /// Bytes covered by the header and complete records.
    pub valid_bytes: u64,
    /// File size in bytes.
    pub file_bytes: u64,
    /// Offset of an incomplete trailing record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torn_at: Option<u64>,
}

/// Reads the header and walks every record of the table at `path`.
pub fn inspect(path: &Path) -> CliResult<InspectResult> {
    require_file(path)?;
    let backend = FileBackend::open_read_only(path)?;
    let summary = summarize(&backend, Some(CommitIdDescriptor::KEY_LEN))?;

    Ok(InspectResult {
        path: path.display().to_string(),
        version: summary.version,
        records: summary.records,
        valid_bytes: summary.valid_bytes,
        file_bytes: summary.total_bytes,
        torn_at: summary.torn_at,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: OutputFormat) -> CliResult<()> {
    let result = inspect(path)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text_output(&result),
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("commitmap Table Inspection");
    println!("==========================");
    println!();
    println!("Path:    {}", result.path);
    println!("Version: {}", result.version);
    println!();
    println!("Records: {}", result.records);
    println!("Valid:   {}", format_size(result.valid_bytes));
    println!("File:    {}", format_size(result.file_bytes));
    if let Some(offset) = result.torn_at {
        println!();
        println!("Incomplete record at offset {offset}, dropped on next open");
    }
}
