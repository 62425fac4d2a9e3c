//! Documentation reconciliation.
//!
//! Two read-only comparisons against the catalog:
//!
//! - the local reference document, a markdown file of `- `name` - description`
//!   bullets ([`parse_local_doc`], [`DocsCoverage`])
//! - the published documentation page, whose inline `<code>` tokens are
//!   matched against catalog names ([`fetch_published`], [`PublishedCoverage`])
//!
//! Neither check is fatal. A missing local file skips that phase with a
//! warning; a failed page fetch yields a degraded [`PublishedCoverage`].

mod coverage;
mod local;
mod published;

use std::path::PathBuf;

pub use coverage::*;
pub use local::*;
pub use published::*;

#[derive(Debug, thiserror::Error)]
pub enum DocsError {
    #[error("Failed to read local docs {path}: {source}")]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
