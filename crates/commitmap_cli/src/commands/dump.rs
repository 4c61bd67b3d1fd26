//! Dump command implementation.

use super::{print_rows, CliResult, CommitRow, OutputFormat, SessionArgs};
use tracing::debug;

/// Collects up to `limit` entries of the session's index in index order.
pub fn collect(session: &SessionArgs, limit: Option<usize>) -> CliResult<Vec<CommitRow>> {
    let limit = limit.unwrap_or(usize::MAX);
    let mut rows = Vec::new();
    if limit == 0 {
        return Ok(rows);
    }

    let summary = session.walk(|idx, commit| {
        rows.push(CommitRow::new(idx, &commit));
        rows.len() < limit
    })?;
    debug!(entries = rows.len(), scanned = summary.records, "dumped index");

    Ok(rows)
}

/// Runs the dump command.
pub fn run(session: &SessionArgs, limit: Option<usize>, format: OutputFormat) -> CliResult<()> {
    let rows = collect(session, limit)?;
    print_rows(&rows, format)
}
