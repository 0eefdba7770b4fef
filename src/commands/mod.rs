pub mod add;
pub mod delete;
pub mod get;
pub mod list;
pub mod query;
pub mod rebuild;
pub mod stats;
pub mod update;

use std::path::Path;

/// Document text from `--content` or `--file`, if either was given
pub fn read_content(content: Option<String>, file: Option<&Path>) -> anyhow::Result<Option<String>> {
    match (content, file) {
        (Some(text), _) => Ok(Some(text)),
        (None, Some(path)) => Ok(Some(std::fs::read_to_string(path)?)),
        (None, None) => Ok(None),
    }
}

/// Update value for a clearable field: `--clear-*` wins, otherwise set when given
pub fn patch_field(value: Option<String>, clear: bool) -> Option<Option<String>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

/// Shorten `s` to at most `max_chars` characters
pub fn truncate(s: &str, max_chars: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
