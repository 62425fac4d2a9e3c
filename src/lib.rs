//! Conformance auditing for a hosted AI model catalog.
//!
//! The catalog of supported models is checked three ways: against the local
//! reference document, against the published documentation page, and by
//! calling every model on the live endpoint with a minimal input for each of
//! its capabilities and validating what comes back.

pub mod catalog;
pub mod client;
pub mod config;
pub mod docs;
pub mod observability;
pub mod report;
pub mod runner;
pub mod synth;
pub mod validate;

#[cfg(test)]
mod test_utils;
