//! License-gate detection and acceptance.
//!
//! Some hosted models refuse requests until the account has agreed to the
//! model's license. The gate is recognized from the error body, the operator
//! is asked through a [`LicensePrompt`], and on acceptance an agreement
//! request is sent before the original request is retried.

use std::{collections::HashSet, sync::LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};

use super::Endpoint;
use crate::synth::media::{tiny_png_byte_array, tiny_png_data_url};

const LICENSE_PHRASES: &[&str] = &[
    "accept the license",
    "community license",
    "hereby agree",
    "license agreement",
    "agree to the terms",
    "submit the prompt 'agree'",
    "must agree",
];

const AGREEMENT_SUCCESS_PHRASES: &[&str] = &[
    "thank you for agreeing",
    "you have agreed",
    "license accepted",
    "already agreed",
];

static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).unwrap());

/// Whether an error body describes a license gate.
pub fn is_license_error(body: &str) -> bool {
    let lowered = body.to_lowercase();
    LICENSE_PHRASES.iter().any(|p| lowered.contains(p))
}

/// Whether an agreement response confirms acceptance.
pub fn is_agreement_success(body: &str) -> bool {
    let lowered = body.to_lowercase();
    AGREEMENT_SUCCESS_PHRASES.iter().any(|p| lowered.contains(p))
}

/// The license URL in an error body: one mentioning a license if present,
/// otherwise the first URL.
pub fn extract_license_url(body: &str) -> Option<String> {
    let urls: Vec<&str> = URL
        .find_iter(body)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', ')', ']', '}']))
        .collect();

    urls.iter()
        .find(|u| u.to_lowercase().contains("licen"))
        .or_else(|| urls.first())
        .map(|u| u.to_string())
}

/// Body of the request that records agreement to a model's license.
pub fn agreement_body(endpoint: Endpoint, image_input: bool) -> Value {
    match endpoint {
        Endpoint::Chat if image_input => json!({
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "agree"},
                    {"type": "image_url", "image_url": {"url": tiny_png_data_url()}},
                ],
            }],
        }),
        Endpoint::Chat => json!({
            "messages": [{"role": "user", "content": "agree"}],
        }),
        Endpoint::Run | Endpoint::Transcription => {
            let mut body = json!({"prompt": "agree"});
            if image_input {
                body["image"] = json!(tiny_png_byte_array());
            }
            body
        }
    }
}

/// Decides whether a model's license may be accepted.
#[async_trait]
pub trait LicensePrompt: Send + Sync {
    async fn confirm(&self, model: &str, license_url: Option<&str>) -> bool;
}

/// Never accepts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDecline;

#[async_trait]
impl LicensePrompt for AutoDecline {
    async fn confirm(&self, model: &str, _license_url: Option<&str>) -> bool {
        tracing::info!(model = %model, "License acceptance declined by policy");
        false
    }
}

/// Accepts only for pre-approved models.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    models: HashSet<String>,
}

impl AllowList {
    pub fn new(models: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            models: models.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl LicensePrompt for AllowList {
    async fn confirm(&self, model: &str, _license_url: Option<&str>) -> bool {
        let accepted = self.models.contains(model);
        tracing::info!(model = %model, accepted, "License acceptance decided by allow list");
        accepted
    }
}

/// Asks the operator on the terminal.
///
/// Runs on the blocking pool so the runtime is not stalled while waiting.
/// Anything other than an explicit yes, including a non-interactive
/// terminal, declines.
#[cfg(feature = "interactive")]
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractivePrompt;

#[cfg(feature = "interactive")]
#[async_trait]
impl LicensePrompt for InteractivePrompt {
    async fn confirm(&self, model: &str, license_url: Option<&str>) -> bool {
        use dialoguer::{Confirm, theme::ColorfulTheme};

        let prompt = match license_url {
            Some(url) => format!("Model '{model}' requires accepting its license ({url}). Accept?"),
            None => format!("Model '{model}' requires accepting its license. Accept?"),
        };

        let answer = tokio::task::spawn_blocking(move || {
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .default(false)
                .interact()
        })
        .await;

        match answer {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => {
                tracing::warn!(model = %model, error = %e, "License prompt unavailable, declining");
                false
            }
            Err(e) => {
                tracing::warn!(model = %model, error = %e, "License prompt task failed, declining");
                false
            }
        }
    }
}
