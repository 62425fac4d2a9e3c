//! Extraction of the catalog literal embedded in registry source text.
//!
//! The registry is a TypeScript-style object literal:
//!
//! ```text
//! export const MODEL_CATALOG: Record<string, ModelInfo> = {
//!   'llama-3.1-8b': {
//!     capability: ['chat'],
//!     provider: 'workers-ai',
//!     providerModel: '@cf/meta/llama-3.1-8b-instruct',
//!     description: 'Fast general chat',
//!   },
//! };
//! ```
//!
//! An array literal of objects carrying a `name` field is accepted too. This is
//! targeted extraction, not a parse: the block is located by its marker, split
//! into top-level entries with a bracket scanner that understands quotes and
//! comments, and each field is read with its own pattern so field order does
//! not matter.

use std::sync::LazyLock;

use regex::Regex;

use super::{
    RawEntry,
    types::{CatalogError, CatalogExtraction},
};

static FIELD_PROVIDER: LazyLock<Regex> = LazyLock::new(|| string_field_regex("provider"));
static FIELD_PROVIDER_MODEL: LazyLock<Regex> =
    LazyLock::new(|| string_field_regex("provider_?[Mm]odel"));
static FIELD_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| string_field_regex("description"));
static FIELD_NAME: LazyLock<Regex> = LazyLock::new(|| string_field_regex("name"));

static FIELD_CAPABILITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bcapabilit(?:y|ies)\s*:\s*(\[[^\]]*\]|'[^']*'|"[^"]*"|`[^`]*`)"#).unwrap()
});

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'([^']*)'|"([^"]*)"|`([^`]*)`"#).unwrap());

static ENTRY_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:'([^']+)'|"([^"]+)"|`([^`]+)`|([A-Za-z_$][\w$.\-]*))\s*:\s*$"#).unwrap()
});

fn string_field_regex(field: &str) -> Regex {
    Regex::new(&format!(
        r#"\b{field}\s*:\s*(?:'((?:\\.|[^'\\])*)'|"((?:\\.|[^"\\])*)"|`((?:\\.|[^`\\])*)`)"#
    ))
    .unwrap()
}

/// Extract raw entries from `source`, in declaration order.
///
/// Fails with [`CatalogError::BlockNotFound`] when no `marker = {` or
/// `marker = [` assignment exists.
pub(super) fn extract_raw_entries(
    source: &str,
    marker: &str,
) -> Result<Vec<RawEntry>, CatalogError> {
    let block_pattern = Regex::new(&format!(r"\b{}\b[^=\n]*=\s*([\{{\[])", regex::escape(marker)))
        .map_err(|_| CatalogError::BlockNotFound {
            marker: marker.to_string(),
        })?;

    let open = block_pattern
        .captures(source)
        .and_then(|c| c.get(1))
        .ok_or_else(|| CatalogError::BlockNotFound {
            marker: marker.to_string(),
        })?;

    let close =
        matching_close(source, open.start()).ok_or_else(|| CatalogError::UnterminatedBlock {
            marker: marker.to_string(),
        })?;

    let body = &source[open.end()..close];
    let keyed = open.as_str() == "{";

    Ok(top_level_objects(body)
        .into_iter()
        .map(|(prefix, object)| {
            let key = if keyed { entry_key(prefix) } else { None };
            read_entry(key, object)
        })
        .collect())
}

/// Parse source text into a validated catalog.
pub fn extract_from_source(source: &str, marker: &str) -> Result<CatalogExtraction, CatalogError> {
    let raw = extract_raw_entries(source, marker)?;
    Ok(super::finalize(raw))
}

fn read_entry(key: Option<String>, object: &str) -> RawEntry {
    let capability = FIELD_CAPABILITY.captures(object).map(|c| {
        QUOTED
            .captures_iter(&c[1])
            .filter_map(|q| q.get(1).or_else(|| q.get(2)).or_else(|| q.get(3)))
            .map(|m| m.as_str().to_string())
            .collect::<Vec<_>>()
    });

    RawEntry {
        name: key.or_else(|| string_field(&FIELD_NAME, object)),
        capability,
        provider: string_field(&FIELD_PROVIDER, object),
        provider_model: string_field(&FIELD_PROVIDER_MODEL, object),
        description: string_field(&FIELD_DESCRIPTION, object),
    }
}

fn string_field(pattern: &Regex, object: &str) -> Option<String> {
    let captures = pattern.captures(object)?;
    let raw = captures
        .get(1)
        .or_else(|| captures.get(2))
        .or_else(|| captures.get(3))?;
    Some(unescape(raw.as_str()))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Key preceding an entry object (`'name':`, `"name":` or `name:`).
fn entry_key(prefix: &str) -> Option<String> {
    let captures = ENTRY_KEY.captures(prefix.trim_end())?;
    (1..=4)
        .find_map(|i| captures.get(i))
        .map(|m| m.as_str().to_string())
}

/// Depth-0 `{...}` objects in `body`, each paired with the text between the
/// previous object and this one.
fn top_level_objects(body: &str) -> Vec<(&str, &str)> {
    let mut objects = Vec::new();
    let mut cursor = 0;
    let mut scanner = Scanner::new(body);

    while let Some((idx, c)) = scanner.next_code_char() {
        match c {
            '{' => {
                let Some(close) = matching_close(body, idx) else {
                    break;
                };
                objects.push((&body[cursor..idx], &body[idx..=close]));
                cursor = close + 1;
                scanner.seek(close + 1);
            }
            '[' | '(' => {
                let Some(close) = matching_close(body, idx) else {
                    break;
                };
                scanner.seek(close + 1);
            }
            _ => {}
        }
    }
    objects
}

/// Index of the bracket closing the one at `open_idx`.
fn matching_close(text: &str, open_idx: usize) -> Option<usize> {
    let mut scanner = Scanner::new(text);
    scanner.seek(open_idx);
    let mut depth = 0usize;

    while let Some((idx, c)) = scanner.next_code_char() {
        match c {
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Byte scanner yielding characters outside string literals and comments.
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn next_code_char(&mut self) -> Option<(usize, char)> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() {
            let idx = self.pos;
            match bytes[idx] {
                quote @ (b'\'' | b'"' | b'`') => {
                    self.pos = skip_string(bytes, idx + 1, quote);
                }
                b'/' if bytes.get(idx + 1) == Some(&b'/') => {
                    self.pos = bytes[idx..]
                        .iter()
                        .position(|&b| b == b'\n')
                        .map_or(bytes.len(), |p| idx + p + 1);
                }
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    self.pos = self.text[idx + 2..]
                        .find("*/")
                        .map_or(bytes.len(), |p| idx + 2 + p + 2);
                }
                b if b.is_ascii() => {
                    self.pos = idx + 1;
                    return Some((idx, b as char));
                }
                _ => self.pos = idx + 1,
            }
        }
        None
    }
}

fn skip_string(bytes: &[u8], mut pos: usize, quote: u8) -> usize {
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b if b == quote => return pos + 1,
            _ => pos += 1,
        }
    }
    bytes.len()
}
