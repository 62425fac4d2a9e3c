//! Minimal inputs per capability.
//!
//! [`synthesize`] builds the smallest request that exercises a capability;
//! [`apply_model_overrides`] then adjusts it for models whose input schema
//! differs from the capability default. Audio inputs are [`Payload::Deferred`]
//! and resolved by [`AudioSource`] right before sending.

mod audio;
pub mod media;

pub use audio::AudioSource;
use serde_json::{Value, json};

use self::media::{tiny_png_byte_array, tiny_png_data_url};
use crate::{catalog::Capability, client::MultipartBody};

/// Largest batch sent to an embeddings model in one request.
pub const MAX_EMBEDDING_BATCH: usize = 32;

/// Image-classification models that also take a text prompt.
pub const PROMPTED_IMAGE_CLASSIFIERS: &[&str] = &["llava", "uform-gen", "moondream"];

pub const CHAT_PROMPT: &str = "Say 'test' and nothing else.";

const EMBEDDING_TEXT: &str = "The quick brown fox jumps over the lazy dog.";

const EMBEDDING_BATCH_TEXTS: [&str; 8] = [
    "Rust guarantees memory safety without a garbage collector.",
    "Rate limits protect shared infrastructure from overload.",
    "A reranker orders candidate passages by relevance to a query.",
    "Embeddings map text to points in a vector space.",
    "Transcription converts recorded speech into text.",
    "Translation models render text in another language.",
    "Summaries keep the essential points of a longer document.",
    "Image classifiers assign labels to pictures.",
];

pub const RERANK_QUERY: &str = "How do I reset my account password?";

/// Candidate passages; the relevant one is first.
pub const RERANK_DOCUMENTS: [&str; 4] = [
    "To reset your password, open Settings, choose Security and click Reset password.",
    "Our office is closed on public holidays.",
    "The quarterly report shows revenue growth in all regions.",
    "Bananas are an excellent source of potassium.",
];

/// Index of the relevant passage in [`RERANK_DOCUMENTS`].
pub const RERANK_EXPECTED_TOP: usize = 0;

const SUMMARIZATION_TEXT: &str = "The city council met on Tuesday to discuss the new public \
    transport plan. After three hours of debate, members voted to extend two bus lines, add \
    a night service on weekends and study a light rail connection to the airport. The plan \
    will be funded by a mix of regional grants and a small increase in parking fees. \
    Construction of the new stops is expected to begin next spring.";

/// A request body that has not been sent yet.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    Multipart(MultipartBody),
    /// Needs resolving through [`AudioSource`] before it can be sent.
    Deferred(DeferredInput),
    /// The test cannot run; the reason starts with `"Skipped: "`.
    Skip(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeferredInput {
    /// The speech clip, fetched once per run.
    ClipAudio,
    /// A generated tone, for models that take raw PCM.
    PcmTone {
        frequency_hz: f64,
        duration_ms: u32,
        sample_rate: u32,
    },
}

impl DeferredInput {
    pub fn default_tone() -> Self {
        Self::PcmTone {
            frequency_hz: 440.0,
            duration_ms: 1_000,
            sample_rate: 16_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("Failed to fetch audio clip {url}: {source}")]
    ClipFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Audio clip {url} returned HTTP {status}")]
    ClipStatus { url: String, status: u16 },

    #[error("Audio clip {url} is empty")]
    EmptyClip { url: String },
}

/// The default payload for `capability`.
pub fn synthesize(capability: &Capability) -> Payload {
    let body = match capability {
        Capability::Chat => json!({
            "messages": [{"role": "user", "content": CHAT_PROMPT}],
            "max_tokens": 500,
        }),
        Capability::Vision => json!({
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "Describe this image in one sentence."},
                    {"type": "image_url", "image_url": {"url": tiny_png_data_url()}},
                ],
            }],
            "max_tokens": 500,
        }),
        Capability::Embeddings => json!({"text": EMBEDDING_TEXT}),
        Capability::Audio => return Payload::Deferred(DeferredInput::ClipAudio),
        Capability::Tts => json!({
            "text": "Hello, this is a short speech synthesis test.",
            "voice": "alloy",
        }),
        Capability::ImageGeneration => json!({
            "prompt": "A calm abstract composition of soft blue and orange shapes",
            "width": 512,
            "height": 512,
            "num_steps": 4,
            "num_images": 1,
        }),
        Capability::PiiDetection => json!({
            "text": "My name is John Smith, my email is john.smith@example.com and my SSN is 123-45-6789.",
        }),
        Capability::TextClassification => json!({
            "text": "I absolutely love this product, it works perfectly and made my day!",
        }),
        Capability::Reranker => json!({
            "query": RERANK_QUERY,
            "contexts": RERANK_DOCUMENTS.iter().map(|text| json!({"text": text})).collect::<Vec<_>>(),
            "top_k": 3,
        }),
        Capability::ImageClassification => json!({"image": tiny_png_byte_array()}),
        Capability::Translation => json!({
            "text": "Good morning, how are you today?",
            "source_lang": "en",
            "target_lang": "es",
        }),
        Capability::Summarization => json!({
            "input_text": SUMMARIZATION_TEXT,
            "max_length": 64,
        }),
        Capability::Unknown(tag) => {
            return Payload::Skip(format!("Skipped: unknown capability '{tag}'"));
        }
    };
    Payload::Json(body)
}

/// A batch of `n` distinct texts for an embeddings model, `n` clamped to
/// `1..=MAX_EMBEDDING_BATCH`.
pub fn synthesize_embedding_batch(n: usize) -> Value {
    let n = n.clamp(1, MAX_EMBEDDING_BATCH);
    let texts: Vec<String> = (0..n)
        .map(|i| {
            let base = EMBEDDING_BATCH_TEXTS[i % EMBEDDING_BATCH_TEXTS.len()];
            if i < EMBEDDING_BATCH_TEXTS.len() {
                base.to_string()
            } else {
                format!("{base} ({})", i / EMBEDDING_BATCH_TEXTS.len() + 1)
            }
        })
        .collect();
    json!({"text": texts})
}

/// Adjust `payload` for models with non-default input schemas.
///
/// Matched by substring on the lowercased model name.
pub fn apply_model_overrides(model: &str, capability: &Capability, payload: Payload) -> Payload {
    let name = model.to_ascii_lowercase();

    match (capability, payload) {
        (Capability::ImageGeneration, Payload::Json(mut body)) => {
            if name.contains("flux-2") {
                return flux2_form(&body);
            }
            if name.contains("inpainting") {
                body["image"] = json!(tiny_png_byte_array());
                body["mask"] = json!(tiny_png_byte_array());
            } else if name.contains("img2img") {
                body["image"] = json!(tiny_png_byte_array());
                body["strength"] = json!(0.5);
            }
            Payload::Json(body)
        }
        (Capability::Tts, Payload::Json(body)) => {
            let text = body["text"].clone();
            if name.contains("melotts") {
                Payload::Json(json!({"prompt": text, "lang": "en"}))
            } else if name.contains("aura") {
                Payload::Json(json!({"text": text, "speaker": "angus"}))
            } else {
                Payload::Json(body)
            }
        }
        (Capability::Translation, Payload::Json(mut body)) => {
            // m2m100 takes the explicit en/es tags as they are
            if name.contains("indictrans") {
                body["target_lang"] = json!("hi");
            }
            Payload::Json(body)
        }
        (Capability::Audio, Payload::Deferred(_))
            if name.contains("deepgram") || name.contains("flux") =>
        {
            Payload::Deferred(DeferredInput::default_tone())
        }
        (Capability::ImageClassification, Payload::Json(mut body))
            if PROMPTED_IMAGE_CLASSIFIERS.iter().any(|p| name.contains(p)) =>
        {
            body["prompt"] = json!("What is shown in this image?");
            Payload::Json(body)
        }
        (_, payload) => payload,
    }
}

fn flux2_form(body: &Value) -> Payload {
    let field = |key: &str| match &body[key] {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Payload::Multipart(
        MultipartBody::new()
            .text("prompt", field("prompt"))
            .text("width", field("width"))
            .text("height", field("height"))
            .text("steps", field("num_steps")),
    )
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn json_body(payload: Payload) -> Value {
        match payload {
            Payload::Json(body) => body,
            other => panic!("expected JSON payload, got {other:?}"),
        }
    }

    #[test]
    fn test_every_known_capability_has_a_payload() {
        for capability in Capability::KNOWN {
            match synthesize(&capability) {
                Payload::Json(body) => assert!(body.is_object(), "{capability}"),
                Payload::Deferred(DeferredInput::ClipAudio) => {
                    assert_eq!(capability, Capability::Audio)
                }
                other => panic!("{capability}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_capability_is_skipped() {
        match synthesize(&Capability::Unknown("object-detection".into())) {
            Payload::Skip(reason) => {
                assert_eq!(reason, "Skipped: unknown capability 'object-detection'")
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn test_reranker_relevant_document_first() {
        let body = json_body(synthesize(&Capability::Reranker));
        assert_eq!(body["contexts"].as_array().unwrap().len(), 4);
        assert!(
            body["contexts"][RERANK_EXPECTED_TOP]["text"]
                .as_str()
                .unwrap()
                .contains("reset your password")
        );
        assert_eq!(body["top_k"], 3);
    }

    #[test]
    fn test_image_generation_defaults() {
        let body = json_body(synthesize(&Capability::ImageGeneration));
        assert_eq!(body["width"], 512);
        assert_eq!(body["height"], 512);
        assert_eq!(body["num_steps"], 4);
        assert_eq!(body["num_images"], 1);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(8, 8)]
    #[case(100, MAX_EMBEDDING_BATCH)]
    fn test_embedding_batch_clamped(#[case] requested: usize, #[case] expected: usize) {
        let body = synthesize_embedding_batch(requested);
        let texts = body["text"].as_array().unwrap();
        assert_eq!(texts.len(), expected);

        let unique: std::collections::HashSet<_> = texts.iter().map(|t| t.as_str().unwrap()).collect();
        assert_eq!(unique.len(), expected);
    }

    #[rstest]
    #[case("sd-v1-5-inpainting", "mask")]
    #[case("sd-v1-5-img2img", "strength")]
    fn test_image_generation_overrides(#[case] model: &str, #[case] field: &str) {
        let payload = synthesize(&Capability::ImageGeneration);
        let body = json_body(apply_model_overrides(model, &Capability::ImageGeneration, payload));
        assert!(body.get(field).is_some());
        assert!(body["image"].is_array());
    }

    #[test]
    fn test_flux2_uses_multipart() {
        let payload = synthesize(&Capability::ImageGeneration);
        match apply_model_overrides("flux-2-dev", &Capability::ImageGeneration, payload) {
            Payload::Multipart(form) => {
                assert!(form.has_field("prompt"));
                assert!(form.fields.contains(&("width".to_string(), "512".to_string())));
            }
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[test]
    fn test_tts_overrides() {
        let melo = json_body(apply_model_overrides(
            "melotts",
            &Capability::Tts,
            synthesize(&Capability::Tts),
        ));
        assert!(melo.get("prompt").is_some());
        assert_eq!(melo["lang"], "en");

        let aura = json_body(apply_model_overrides(
            "aura-1",
            &Capability::Tts,
            synthesize(&Capability::Tts),
        ));
        assert!(aura.get("speaker").is_some());
        assert!(aura.get("voice").is_none());
    }

    #[rstest]
    #[case("indictrans2-en-indic", "hi")]
    #[case("m2m100-1.2b", "es")]
    fn test_translation_targets(#[case] model: &str, #[case] target: &str) {
        let body = json_body(apply_model_overrides(
            model,
            &Capability::Translation,
            synthesize(&Capability::Translation),
        ));
        assert_eq!(body["target_lang"], target);
        assert_eq!(body["source_lang"], "en");
    }

    #[rstest]
    #[case("deepgram-nova-3")]
    #[case("deepgram/flux")]
    fn test_pcm_audio_overrides(#[case] model: &str) {
        let payload = apply_model_overrides(model, &Capability::Audio, synthesize(&Capability::Audio));
        assert!(matches!(payload, Payload::Deferred(DeferredInput::PcmTone { .. })));
    }

    #[test]
    fn test_whisper_keeps_clip() {
        let payload = apply_model_overrides("whisper-large-v3", &Capability::Audio, synthesize(&Capability::Audio));
        assert!(matches!(payload, Payload::Deferred(DeferredInput::ClipAudio)));
    }

    #[test]
    fn test_prompted_image_classifier() {
        let body = json_body(apply_model_overrides(
            "llava-1.5-7b",
            &Capability::ImageClassification,
            synthesize(&Capability::ImageClassification),
        ));
        assert!(body["prompt"].is_string());

        let plain = json_body(apply_model_overrides(
            "resnet-50",
            &Capability::ImageClassification,
            synthesize(&Capability::ImageClassification),
        ));
        assert!(plain.get("prompt").is_none());
    }
}
