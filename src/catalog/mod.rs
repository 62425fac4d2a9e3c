//! Model catalog module.
//!
//! The catalog is the authoritative list of models under audit. It is read
//! fresh on every run and never modified afterwards.
//!
//! Structured registries are preferred: `.json` (an array of entries, or an
//! object with a `models` array) and `.toml` (`[[models]]` tables) are
//! deserialized directly. Any other file is treated as program source with the
//! catalog embedded as a literal and goes through
//! [`extract_from_source`].
//!
//! Every format goes through the same validation. Entries with no capability,
//! a missing provider route, or a duplicate name are excluded, logged at
//! `warn`, and listed in [`CatalogExtraction::skipped`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use model_audit::catalog::load_catalog;
//!
//! let catalog = load_catalog(Path::new("catalog/models.ts"), "MODEL_CATALOG")?;
//! for entry in &catalog.entries {
//!     println!("{}: {:?}", entry.name, entry.capability);
//! }
//! ```

mod extract;
mod types;

use std::{collections::HashSet, path::Path};

pub use extract::extract_from_source;
use serde::Deserialize;
pub use types::*;

/// An entry as read from the registry, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "capabilities", deserialize_with = "one_or_many")]
    capability: Option<Vec<String>>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default, rename = "providerModel", alias = "provider_model")]
    provider_model: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonCatalog {
    List(Vec<RawEntry>),
    Wrapped { models: Vec<RawEntry> },
}

#[derive(Deserialize)]
struct TomlCatalog {
    #[serde(default)]
    models: Vec<RawEntry>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(tag)) => Some(vec![tag]),
        Some(OneOrMany::Many(tags)) => Some(tags),
        None => None,
    })
}

/// Load the catalog at `path`, choosing the reader by file extension.
pub fn load_catalog(path: &Path, marker: &str) -> Result<CatalogExtraction, CatalogError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| CatalogError::Io(e, path.to_path_buf()))?;

    let extraction = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => from_json_str(&contents)?,
        Some("toml") => from_toml_str(&contents)?,
        _ => extract_from_source(&contents, marker)?,
    };

    tracing::info!(
        path = %path.display(),
        models = extraction.len(),
        skipped = extraction.skipped.len(),
        "Loaded model catalog"
    );
    Ok(extraction)
}

/// Parse a JSON registry.
pub fn from_json_str(json: &str) -> Result<CatalogExtraction, CatalogError> {
    let raw = match serde_json::from_str::<JsonCatalog>(json)? {
        JsonCatalog::List(entries) | JsonCatalog::Wrapped { models: entries } => entries,
    };
    Ok(finalize(raw))
}

/// Parse a TOML registry.
pub fn from_toml_str(toml_text: &str) -> Result<CatalogExtraction, CatalogError> {
    let catalog: TomlCatalog = toml::from_str(toml_text)?;
    Ok(finalize(catalog.models))
}

/// Validate raw entries in order, keeping the first occurrence of each name.
pub(crate) fn finalize(raw: Vec<RawEntry>) -> CatalogExtraction {
    let mut extraction = CatalogExtraction::default();
    let mut seen = HashSet::new();

    for (idx, entry) in raw.into_iter().enumerate() {
        let label = entry
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("#{}", idx + 1));

        match validate_entry(entry) {
            Ok(model) if !seen.insert(model.name.clone()) => {
                skip(&mut extraction, label, "duplicate model name".to_string());
            }
            Ok(model) => extraction.entries.push(model),
            Err(reason) => skip(&mut extraction, label, reason),
        }
    }

    extraction
}

fn skip(extraction: &mut CatalogExtraction, name: String, reason: String) {
    tracing::warn!(model = %name, reason = %reason, "Skipping malformed catalog entry");
    extraction.skipped.push(SkippedEntry { name, reason });
}

fn validate_entry(raw: RawEntry) -> Result<ModelEntry, String> {
    let name = required(raw.name, "name")?;
    let provider = required(raw.provider, "provider")?;
    let provider_model = required(raw.provider_model, "providerModel")?;

    let mut capability: Vec<Capability> = Vec::new();
    for tag in raw.capability.unwrap_or_default() {
        if tag.trim().is_empty() {
            continue;
        }
        let parsed = Capability::from(tag);
        if !capability.contains(&parsed) {
            capability.push(parsed);
        }
    }
    if capability.is_empty() {
        return Err("capability list is missing or empty".to_string());
    }

    Ok(ModelEntry {
        name,
        capability,
        provider,
        provider_model,
        description: raw.description.unwrap_or_default(),
    })
}

fn required(value: Option<String>, field: &str) -> Result<String, String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("missing required field '{field}'"))
}
