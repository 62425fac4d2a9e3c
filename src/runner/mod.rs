//! Live test execution.
//!
//! Every test follows the same path: resolve the input (which may skip),
//! send it through the [`ResilientClient`], then validate the response. Client
//! and validation errors become failed [`TestResult`]s; nothing escapes a
//! single test.

mod generic;
mod platform;

use std::time::Instant;

use base64::{Engine, engine::general_purpose::STANDARD};
pub use platform::*;
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    catalog::Capability,
    client::{ApiRequest, ApiResponse, ResilientClient, truncate},
    report,
    synth::AudioSource,
    validate::ValidationResult,
};

/// Prefix that marks a successful result as a skip.
pub const SKIP_PREFIX: &str = "Skipped: ";

const ERROR_BODY_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

/// Result of one (model, capability) or platform test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    pub model: String,

    /// Capability tag, or module tag for platform tests.
    pub capability: String,

    /// Platform fixture name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,

    pub success: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub details: Option<String>,
}

impl TestResult {
    pub fn passed(model: &str, capability: &str, latency_ms: u64, details: Option<String>) -> Self {
        Self {
            model: model.to_string(),
            capability: capability.to_string(),
            test: None,
            success: true,
            latency_ms: Some(latency_ms),
            error: None,
            details,
        }
    }

    pub fn failed(
        model: &str,
        capability: &str,
        latency_ms: Option<u64>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            model: model.to_string(),
            capability: capability.to_string(),
            test: None,
            success: false,
            latency_ms,
            error: Some(error.into()),
            details: None,
        }
    }

    /// A skip; `reason` gains the `"Skipped: "` prefix if it lacks one.
    pub fn skipped(model: &str, capability: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let reason = if reason.starts_with(SKIP_PREFIX) {
            reason
        } else {
            format!("{SKIP_PREFIX}{reason}")
        };
        Self {
            model: model.to_string(),
            capability: capability.to_string(),
            test: None,
            success: true,
            latency_ms: None,
            error: Some(reason),
            details: None,
        }
    }

    pub fn with_test(mut self, test: &str) -> Self {
        self.test = Some(test.to_string());
        self
    }

    pub fn outcome(&self) -> Outcome {
        match (self.success, &self.error) {
            (false, _) => Outcome::Failed,
            (true, Some(e)) if e.starts_with(SKIP_PREFIX) => Outcome::Skipped,
            (true, _) => Outcome::Passed,
        }
    }
}

/// Runs tests against the live endpoint, one at a time.
pub struct Runner<'a> {
    client: &'a ResilientClient,
    audio: &'a AudioSource,
    trace: bool,
}

impl<'a> Runner<'a> {
    pub fn new(client: &'a ResilientClient, audio: &'a AudioSource) -> Self {
        Self {
            client,
            audio,
            trace: true,
        }
    }

    /// Print a line per finished test.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    fn record(&self, result: TestResult, results: &mut Vec<TestResult>) {
        if self.trace {
            report::print_test_line(&result);
        }
        results.push(result);
    }

    /// Send `request` and judge the response with `validator`.
    async fn execute<V>(
        &self,
        model: &str,
        tag: &str,
        media: &Capability,
        request: &ApiRequest,
        validator: V,
    ) -> TestResult
    where
        V: FnOnce(&Value) -> ValidationResult,
    {
        let started = Instant::now();
        let response = self.client.send(request, model).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(model = %model, capability = %tag, error = %e, "Test request failed");
                return TestResult::failed(model, tag, Some(latency_ms), e.to_string());
            }
        };

        if !response.is_success() {
            return TestResult::failed(
                model,
                tag,
                Some(latency_ms),
                format!(
                    "HTTP {}: {}",
                    response.status.as_u16(),
                    truncate(response.text().trim(), ERROR_BODY_LEN)
                ),
            );
        }

        let Some(body) = response_body(&response, media) else {
            return TestResult::failed(
                model,
                tag,
                Some(latency_ms),
                format!(
                    "Response is not JSON: {}",
                    truncate(response.text().trim(), ERROR_BODY_LEN)
                ),
            );
        };

        let validation = validator(&body);
        if validation.valid {
            TestResult::passed(model, tag, latency_ms, validation.details)
        } else {
            TestResult::failed(
                model,
                tag,
                Some(latency_ms),
                validation
                    .error
                    .unwrap_or_else(|| "Validation failed".to_string()),
            )
        }
    }
}

/// The response as JSON. Raw media bodies become `{audio|image: <base64>}`.
pub fn response_body(response: &ApiResponse, capability: &Capability) -> Option<Value> {
    let media_key = match capability {
        Capability::ImageGeneration => "image",
        _ => "audio",
    };
    let expects_media = matches!(capability, Capability::Tts | Capability::ImageGeneration);

    if response.is_binary() {
        return Some(json!({media_key: STANDARD.encode(&response.body)}));
    }
    match response.json() {
        Some(body) => Some(body),
        None if expects_media && !response.body.is_empty() => {
            Some(json!({media_key: STANDARD.encode(&response.body)}))
        }
        None => None,
    }
}
