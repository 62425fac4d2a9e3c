use std::collections::BTreeSet;

use serde::Serialize;

/// Comparison of the catalog against the local reference document.
///
/// `documented` and `in_catalog_not_docs` partition the catalog names;
/// `in_docs_not_catalog` holds names the document lists that the catalog does
/// not know.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocsCoverage {
    pub documented: BTreeSet<String>,
    pub in_catalog_not_docs: BTreeSet<String>,
    pub in_docs_not_catalog: BTreeSet<String>,
}

impl DocsCoverage {
    pub fn compute<'a, C, D>(catalog_names: C, doc_names: D) -> Self
    where
        C: IntoIterator<Item = &'a str>,
        D: IntoIterator<Item = &'a str>,
    {
        let catalog: BTreeSet<String> = catalog_names.into_iter().map(str::to_string).collect();
        let docs: BTreeSet<String> = doc_names.into_iter().map(str::to_string).collect();

        Self {
            documented: catalog.intersection(&docs).cloned().collect(),
            in_catalog_not_docs: catalog.difference(&docs).cloned().collect(),
            in_docs_not_catalog: docs.difference(&catalog).cloned().collect(),
        }
    }

    pub fn catalog_total(&self) -> usize {
        self.documented.len() + self.in_catalog_not_docs.len()
    }

    /// Share of catalog models that are documented. An empty catalog is fully covered.
    pub fn coverage_percent(&self) -> f64 {
        percent(self.documented.len(), self.catalog_total())
    }
}

/// Comparison of the catalog against the published documentation page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishedCoverage {
    pub synced: BTreeSet<String>,
    pub missing_from_page: BTreeSet<String>,
    pub stale_on_page: BTreeSet<String>,

    /// Set when the page could not be fetched; all sets are then empty.
    pub fetch_error: Option<String>,
}

impl PublishedCoverage {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            fetch_error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.fetch_error.is_some()
    }

    pub fn catalog_total(&self) -> usize {
        self.synced.len() + self.missing_from_page.len()
    }

    pub fn sync_percent(&self) -> f64 {
        percent(self.synced.len(), self.catalog_total())
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (part as f64 / total as f64) * 100.0
}
