//! Response validation.
//!
//! [`validate`] judges a parsed response body for a capability. It never
//! panics; every shape it does not understand becomes a failed
//! [`ValidationResult`] with a reason.

mod embeddings;
mod ranking;

pub use embeddings::*;
pub use ranking::*;
use serde::Serialize;
use serde_json::Value;

use crate::{catalog::Capability, client::truncate, synth::RERANK_EXPECTED_TOP};

/// Smallest inline audio or image accepted as real media.
pub const MIN_MEDIA_LEN: usize = 100;

const EXCERPT_LEN: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
    pub details: Option<String>,
}

impl ValidationResult {
    pub fn pass(details: impl Into<String>) -> Self {
        Self {
            valid: true,
            error: None,
            details: Some(details.into()),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            details: None,
        }
    }
}

/// Validate `body` as the response of a `capability` test.
pub fn validate(capability: &Capability, body: &Value) -> ValidationResult {
    validate_for(capability, None, body)
}

/// Validate with the request that produced `body`, for checks that depend on
/// what was asked.
pub fn validate_for(capability: &Capability, request: Option<&Value>, body: &Value) -> ValidationResult {
    let body = match unwrap_envelope(body) {
        Ok(inner) => inner,
        Err(error) => return ValidationResult::fail(error),
    };

    match capability {
        Capability::Chat | Capability::Vision => validate_chat(body),
        Capability::Embeddings => validate_embeddings(body),
        Capability::Tts => validate_tts(body),
        Capability::PiiDetection => validate_pii(body),
        Capability::ImageGeneration => validate_image(body),
        Capability::Translation => {
            let target = request
                .and_then(|r| r.get("target_lang"))
                .and_then(Value::as_str);
            validate_translation(body, target)
        }
        Capability::Summarization => validate_summary(body),
        Capability::TextClassification | Capability::ImageClassification => {
            validate_classification(body)
        }
        Capability::Reranker => validate_reranker(body, RERANK_EXPECTED_TOP),
        Capability::Audio => validate_transcription(body),
        Capability::Unknown(_) => validate_non_empty(body),
    }
}

/// Strip a `{result: ..., success: true}` envelope. A `success: false`
/// envelope becomes the provider's error message.
pub fn unwrap_envelope(body: &Value) -> Result<&Value, String> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let reason = body
            .get("errors")
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("request reported success: false");
        return Err(format!("Provider error: {reason}"));
    }
    match body.get("result") {
        Some(inner) if !inner.is_null() => Ok(inner),
        _ => Ok(body),
    }
}

fn non_empty_str<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| body.get(k).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

/// Non-empty `choices[0].message.content`, or a `/run` style `response`.
pub fn validate_chat(body: &Value) -> ValidationResult {
    let content = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .or_else(|| body.get("response").and_then(Value::as_str));

    match content {
        Some(text) if !text.trim().is_empty() => {
            ValidationResult::pass(format!("response: \"{}\"", truncate(text.trim(), EXCERPT_LEN)))
        }
        Some(_) => ValidationResult::fail("Chat completion content is empty"),
        None => ValidationResult::fail("No choices[0].message.content in response"),
    }
}

fn validate_tts(body: &Value) -> ValidationResult {
    match body.get("audio") {
        Some(Value::String(s)) if s.len() >= MIN_MEDIA_LEN => {
            ValidationResult::pass(format!("audio: {} base64 chars", s.len()))
        }
        Some(Value::Array(bytes)) if bytes.len() >= MIN_MEDIA_LEN => {
            ValidationResult::pass(format!("audio: {} bytes", bytes.len()))
        }
        Some(Value::String(s)) => ValidationResult::fail(format!("Audio too short ({} chars)", s.len())),
        Some(Value::Array(bytes)) => {
            ValidationResult::fail(format!("Audio too short ({} bytes)", bytes.len()))
        }
        Some(Value::Null) | None => ValidationResult::fail("No audio in response"),
        Some(_) => ValidationResult::pass("audio present"),
    }
}

fn validate_pii(body: &Value) -> ValidationResult {
    let entities = ["entities", "pii_entities"]
        .iter()
        .find_map(|k| body.get(k).and_then(Value::as_array));
    match entities {
        Some(list) if !list.is_empty() => {
            ValidationResult::pass(format!("{} entities detected", list.len()))
        }
        Some(_) => ValidationResult::fail("No PII entities detected"),
        None => ValidationResult::fail("No entities or pii_entities in response"),
    }
}

fn validate_image(body: &Value) -> ValidationResult {
    match body.get("image") {
        Some(Value::String(s)) if s.len() >= MIN_MEDIA_LEN => {
            return ValidationResult::pass(format!("image: {} base64 chars", s.len()));
        }
        Some(Value::Array(bytes)) if bytes.len() >= MIN_MEDIA_LEN => {
            return ValidationResult::pass(format!("image: {} bytes", bytes.len()));
        }
        Some(Value::String(_) | Value::Array(_)) => {
            return ValidationResult::fail("Image data too small");
        }
        _ => {}
    }

    let generated = body
        .get("data")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|first| non_empty_str(first, &["url", "b64_json"]));
    match generated {
        Some(_) => ValidationResult::pass("image returned in data[0]"),
        None => ValidationResult::fail("No image in response"),
    }
}

fn validate_translation(body: &Value, target: Option<&str>) -> ValidationResult {
    let Some(text) = non_empty_str(body, &["translated_text", "translation", "text"]) else {
        return ValidationResult::fail("No translated text in response");
    };

    let excerpt = truncate(text.trim(), EXCERPT_LEN);
    let details = match target.map(|t| (t, looks_like_language(text, t))) {
        Some((lang, Some(true))) => format!("\"{excerpt}\" (looks like {lang})"),
        Some((lang, Some(false))) => format!("\"{excerpt}\" (does not look like {lang})"),
        _ => format!("\"{excerpt}\""),
    };
    ValidationResult::pass(details)
}

/// Best-effort script or marker-word check. `None` when the language is not
/// one we know how to recognize.
fn looks_like_language(text: &str, lang: &str) -> Option<bool> {
    let lowered = text.to_lowercase();
    let has_word = |words: &[&str]| {
        lowered
            .split(|c: char| !c.is_alphabetic())
            .any(|w| words.contains(&w))
    };

    match lang {
        "es" => Some(
            lowered.contains(['ñ', '¿', '¡', 'á', 'é', 'í', 'ó', 'ú'])
                || has_word(&["buenos", "días", "cómo", "estás", "hoy", "el", "la", "que", "y"]),
        ),
        "fr" => Some(has_word(&["bonjour", "le", "la", "les", "est", "vous", "comment"])),
        "de" => Some(has_word(&["guten", "der", "die", "das", "und", "wie", "ist"])),
        "hi" => Some(text.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c))),
        _ => None,
    }
}

fn validate_summary(body: &Value) -> ValidationResult {
    match non_empty_str(body, &["summary"]) {
        Some(summary) => ValidationResult::pass(format!(
            "summary: \"{}\"",
            truncate(summary.trim(), EXCERPT_LEN)
        )),
        None => ValidationResult::fail("No summary in response"),
    }
}

fn validate_transcription(body: &Value) -> ValidationResult {
    if let Some(text) = non_empty_str(body, &["text", "transcription"]) {
        return ValidationResult::pass(format!(
            "transcript: \"{}\"",
            truncate(text.trim(), EXCERPT_LEN)
        ));
    }
    // Real-time models reply in channel form; a tone input yields an empty transcript.
    if body
        .pointer("/results/channels/0/alternatives/0/transcript")
        .is_some_and(Value::is_string)
    {
        return ValidationResult::pass("transcript present in results.channels");
    }
    ValidationResult::fail("No transcription text in response")
}

fn validate_non_empty(body: &Value) -> ValidationResult {
    let has_content = match body {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    };
    if has_content {
        ValidationResult::pass("non-empty response")
    } else {
        ValidationResult::fail("Empty response")
    }
}
