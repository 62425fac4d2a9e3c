//! Observability module providing structured logging.
//!
//! This module initializes and configures:
//! - Structured logging with configurable formats (pretty, compact, JSON)
//! - Redaction of bulky binary-ish payload fields before they are logged

mod redact;
#[cfg(feature = "cli")]
mod tracing_init;

pub use redact::*;
#[cfg(feature = "cli")]
pub use tracing_init::*;
