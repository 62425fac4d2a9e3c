use std::{path::Path, sync::LazyLock};

use regex::Regex;

use super::DocsError;

/// `- `name` - description`, with `*` bullets and en/em dash separators.
static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*]\s+`([^`\s]+)`\s*(?:[-\u{2013}\u{2014}:]|$)").unwrap()
});

/// Extract model names from the bullet lines of a reference document.
///
/// Names keep document order; repeated names are reported once.
pub fn parse_local_doc(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = BULLET.captures(line) {
            let name = caps[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Read and parse the reference document at `path`.
pub fn read_local_doc(path: &Path) -> Result<Vec<String>, DocsError> {
    let text = std::fs::read_to_string(path).map_err(|e| DocsError::LocalRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(parse_local_doc(&text))
}
