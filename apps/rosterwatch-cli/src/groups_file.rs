//! Plain-text list of group names to audit, one per line.

use std::path::Path;

use crate::error::{CliError, CliResult};

/// Reads group names from `path`.
///
/// Fails when the file cannot be read or names no group at all.
pub fn read_group_names(path: &Path) -> CliResult<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CliError::Input(format!("cannot read groups file {}: {}", path.display(), e))
    })?;

    let names = parse_group_names(&text);
    if names.is_empty() {
        return Err(CliError::Input(format!(
            "groups file {} contains no group names",
            path.display()
        )));
    }
    Ok(names)
}

/// Splits `text` into trimmed, non-blank lines. A leading BOM is ignored.
pub fn parse_group_names(text: &str) -> Vec<String> {
    text.trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
