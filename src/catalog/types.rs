//! Type definitions for the model catalog.

use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

/// The kind of AI task a model performs.
///
/// Tags that are not recognized are kept as [`Capability::Unknown`] so they
/// surface as skips in the test run instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Capability {
    Chat,
    Vision,
    Embeddings,
    Audio,
    Tts,
    ImageGeneration,
    PiiDetection,
    TextClassification,
    Reranker,
    ImageClassification,
    Translation,
    Summarization,
    Unknown(String),
}

impl Capability {
    /// Every recognized capability, in report order.
    pub const KNOWN: [Capability; 12] = [
        Capability::Chat,
        Capability::Vision,
        Capability::Embeddings,
        Capability::Audio,
        Capability::Tts,
        Capability::ImageGeneration,
        Capability::PiiDetection,
        Capability::TextClassification,
        Capability::Reranker,
        Capability::ImageClassification,
        Capability::Translation,
        Capability::Summarization,
    ];

    /// Canonical tag.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Chat => "chat",
            Self::Vision => "vision",
            Self::Embeddings => "embeddings",
            Self::Audio => "audio",
            Self::Tts => "tts",
            Self::ImageGeneration => "image-generation",
            Self::PiiDetection => "pii-detection",
            Self::TextClassification => "text-classification",
            Self::Reranker => "reranker",
            Self::ImageClassification => "image-classification",
            Self::Translation => "translation",
            Self::Summarization => "summarization",
            Self::Unknown(tag) => tag,
        }
    }

    /// Whether the capability is served by the chat-completions endpoint.
    pub fn uses_chat_endpoint(&self) -> bool {
        matches!(self, Self::Chat | Self::Vision)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl FromStr for Capability {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        Ok(match normalized.as_str() {
            "chat" | "text-generation" | "completion" => Self::Chat,
            "vision" | "image-to-text" => Self::Vision,
            "embeddings" | "embedding" | "text-embeddings" => Self::Embeddings,
            "audio" | "transcription" | "speech-recognition" | "automatic-speech-recognition" => {
                Self::Audio
            }
            "tts" | "text-to-speech" => Self::Tts,
            "image-generation" | "text-to-image" => Self::ImageGeneration,
            "pii-detection" | "pii" => Self::PiiDetection,
            "text-classification" | "classification" => Self::TextClassification,
            "reranker" | "rerank" | "reranking" => Self::Reranker,
            "image-classification" => Self::ImageClassification,
            "translation" => Self::Translation,
            "summarization" | "summarize" => Self::Summarization,
            _ => Self::Unknown(s.trim().to_string()),
        })
    }
}

impl From<String> for Capability {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(capability) => capability,
            Err(never) => match never {},
        }
    }
}

impl From<Capability> for String {
    fn from(value: Capability) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One supported model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Unique identifier used in requests and reports.
    pub name: String,

    /// Non-empty, de-duplicated, in declaration order.
    pub capability: Vec<Capability>,

    /// Upstream provider identifier (opaque).
    pub provider: String,

    /// Upstream model identifier (opaque).
    #[serde(rename = "providerModel", alias = "provider_model")]
    pub provider_model: String,

    /// Free text for reports.
    #[serde(default)]
    pub description: String,
}

impl ModelEntry {
    pub fn has_capability(&self, capability: &Capability) -> bool {
        self.capability.contains(capability)
    }
}

/// An entry excluded during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    /// Entry name if one could be read, otherwise `#<position>`.
    pub name: String,
    pub reason: String,
}

/// Result of extracting a catalog.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogExtraction {
    pub entries: Vec<ModelEntry>,
    pub skipped: Vec<SkippedEntry>,
}

impl CatalogExtraction {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Catalog loading errors. All of them abort the run.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Model catalog block '{marker}' not found in registry source")]
    BlockNotFound { marker: String },

    #[error("Model catalog block '{marker}' is not terminated")]
    UnterminatedBlock { marker: String },

    #[error("Failed to read catalog {1}: {0}")]
    Io(std::io::Error, PathBuf),

    #[error("Failed to parse JSON catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML catalog: {0}")]
    Toml(#[from] toml::de::Error),
}
