//! Find command implementation.

use super::{print_rows, CliError, CliResult, CommitRow, OutputFormat, SessionArgs};
use commitmap_core::HASH_LEN;

/// Normalizes a hex prefix to lower case, rejecting anything that cannot
/// start a hash.
fn normalize_prefix(prefix: &str) -> CliResult<String> {
    let valid = !prefix.is_empty()
        && prefix.len() <= HASH_LEN * 2
        && prefix.chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(prefix.to_ascii_lowercase())
    } else {
        Err(CliError::InvalidPrefix(prefix.to_owned()))
    }
}

/// Returns every entry whose hex hash starts with `prefix`, in index order.
pub fn search(session: &SessionArgs, prefix: &str) -> CliResult<Vec<CommitRow>> {
    let prefix = normalize_prefix(prefix)?;
    let mut rows = Vec::new();
    session.walk(|idx, commit| {
        if commit.hash().to_hex().starts_with(&prefix) {
            rows.push(CommitRow::new(idx, &commit));
        }
        true
    })?;
    Ok(rows)
}

/// Runs the find command.
pub fn run(session: &SessionArgs, prefix: &str, format: OutputFormat) -> CliResult<()> {
    let rows = search(session, prefix)?;
    if rows.is_empty() && format == OutputFormat::Text {
        println!("no commit matches '{prefix}'");
        return Ok(());
    }
    print_rows(&rows, format)
}
