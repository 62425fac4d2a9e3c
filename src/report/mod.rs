//! Console output and the JSON report.
//!
//! Console lines go to stdout with ANSI colors, which `console` disables when
//! stdout is not a terminal. Diagnostics go through `tracing` to stderr.

use std::{io, path::Path};

use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;

use crate::{
    catalog::{CatalogExtraction, SkippedEntry},
    docs::{DocsCoverage, PublishedCoverage},
    runner::{Outcome, TestResult},
};

/// Tally of a test run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
    pub failures: Vec<TestResult>,
}

impl Summary {
    pub fn tally(results: &[TestResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.outcome() {
                Outcome::Passed => summary.passed += 1,
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Failed => {
                    summary.failed += 1;
                    summary.failures.push(result.clone());
                }
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

pub fn print_phase_header(title: &str) {
    println!();
    println!("{}", style(format!("== {title} ==")).cyan().bold());
}

pub fn print_group_header(name: &str, count: usize) {
    println!();
    println!(
        "{} {}",
        style(name).bold(),
        style(format!("({count})")).dim()
    );
}

pub fn print_test_line(result: &TestResult) {
    let label = match &result.test {
        Some(test) => format!("{} [{test}]", result.model),
        None => result.model.clone(),
    };
    let latency = result
        .latency_ms
        .map(|ms| format!(" {}", style(format!("{ms}ms")).dim()))
        .unwrap_or_default();

    match result.outcome() {
        Outcome::Passed => println!(
            "  {} {label}{latency} {}",
            style("PASS").green().bold(),
            result.details.as_deref().unwrap_or_default()
        ),
        Outcome::Skipped => println!(
            "  {} {label} {}",
            style("SKIP").yellow().bold(),
            style(result.error.as_deref().unwrap_or_default()).yellow()
        ),
        Outcome::Failed => println!(
            "  {} {label}{latency} {}",
            style("FAIL").red().bold(),
            style(result.error.as_deref().unwrap_or_default()).red()
        ),
    }
}

pub fn print_catalog_summary(catalog: &CatalogExtraction) {
    println!(
        "Catalog: {} models{}",
        style(catalog.len()).bold(),
        if catalog.skipped.is_empty() {
            String::new()
        } else {
            format!(", {} malformed entries skipped", catalog.skipped.len())
        }
    );
    for SkippedEntry { name, reason } in &catalog.skipped {
        println!("  {} {name}: {reason}", style("!").yellow());
    }
}

pub fn print_docs_coverage(coverage: &DocsCoverage) {
    println!(
        "Local docs: {}/{} documented ({})",
        coverage.documented.len(),
        coverage.catalog_total(),
        percent_style(coverage.coverage_percent())
    );
    print_name_list("In catalog, missing from docs", &coverage.in_catalog_not_docs);
    print_name_list("In docs, missing from catalog", &coverage.in_docs_not_catalog);
}

pub fn print_published_coverage(coverage: &PublishedCoverage) {
    if let Some(error) = &coverage.fetch_error {
        println!(
            "Published docs: {} {}",
            style("unavailable").yellow().bold(),
            style(error).yellow()
        );
        return;
    }
    println!(
        "Published docs: {}/{} in sync ({})",
        coverage.synced.len(),
        coverage.catalog_total(),
        percent_style(coverage.sync_percent())
    );
    print_name_list("Missing from published page", &coverage.missing_from_page);
    print_name_list("Stale on published page", &coverage.stale_on_page);
}

pub fn print_summary(summary: &Summary) {
    println!();
    println!(
        "Results: {} passed, {} skipped, {} failed, {} total",
        style(summary.passed).green().bold(),
        style(summary.skipped).yellow().bold(),
        if summary.failed > 0 {
            style(summary.failed).red().bold()
        } else {
            style(summary.failed).bold()
        },
        summary.total
    );
    if summary.has_failures() {
        println!("{}", style("Failures:").red().bold());
        for failure in &summary.failures {
            println!(
                "  {} ({}): {}",
                failure.model,
                failure.test.as_deref().unwrap_or(&failure.capability),
                failure.error.as_deref().unwrap_or_default()
            );
        }
    }
}

fn print_name_list<'a>(title: &str, names: impl IntoIterator<Item = &'a String>) {
    let names: Vec<&String> = names.into_iter().collect();
    if names.is_empty() {
        return;
    }
    println!("  {title} ({}):", names.len());
    for name in names {
        println!("    - {name}");
    }
}

fn percent_style(percent: f64) -> console::StyledObject<String> {
    let text = format!("{percent:.1}%");
    if percent >= 100.0 {
        style(text).green()
    } else if percent >= 80.0 {
        style(text).yellow()
    } else {
        style(text).red()
    }
}

/// Everything a run produced, written by `--report`.
#[derive(Debug, Serialize)]
pub struct AuditReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub base_url: &'a str,
    pub models: usize,
    pub skipped_entries: &'a [SkippedEntry],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<&'a DocsCoverage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<&'a PublishedCoverage>,
    pub results: &'a [TestResult],
    pub summary: &'a Summary,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write report {1}: {0}")]
    Io(io::Error, std::path::PathBuf),
}

impl AuditReport<'_> {
    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| ReportError::Io(e, path.to_path_buf()))?;
        tracing::info!(path = %path.display(), "Wrote audit report");
        Ok(())
    }
}
