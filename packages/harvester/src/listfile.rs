//! Line-oriented list files (one token per line).

use std::fs;
use std::path::Path;

use crate::error::Result;

/// Read a list file.
///
/// Surrounding whitespace is stripped from every line and blank lines are
/// dropped.
///
/// # Arguments
/// * `path` - File to read
///
/// # Returns
/// The tokens in file order
pub fn read_list_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_list(&content))
}

/// Split list-file content into tokens.
///
/// # Examples
/// ```
/// use literature_harvester::listfile::parse_list;
///
/// assert_eq!(parse_list("60\n 64 \n\n2105\n"), vec!["60", "64", "2105"]);
/// ```
#[must_use]
pub fn parse_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
