use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Hosted endpoint used when neither the config file nor the environment
/// names one.
pub const DEFAULT_BASE_URL: &str = "https://gateway.ai.example.com/v1";

/// Target endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    /// Base URL; `/chat/completions`, `/run` and `/audio/transcriptions` are
    /// resolved against it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every live call. Live phases are skipped when unset.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

/// Where the model registry lives and how to find its block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Registry file. `.json` and `.toml` are deserialized directly; anything
    /// else is treated as source text containing the catalog literal.
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,

    /// Identifier that introduces the catalog literal in source text.
    #[serde(default = "default_catalog_marker")]
    pub marker: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
            marker: default_catalog_marker(),
        }
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("catalog/models.ts")
}

fn default_catalog_marker() -> String {
    "MODEL_CATALOG".to_string()
}

/// Documentation sources compared against the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocsConfig {
    /// Local reference document listing models as `- `name` - description`.
    #[serde(default = "default_local_docs_path")]
    pub local_path: PathBuf,

    /// Published documentation page.
    #[serde(default = "default_published_url")]
    pub published_url: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            local_path: default_local_docs_path(),
            published_url: default_published_url(),
        }
    }
}

fn default_local_docs_path() -> PathBuf {
    PathBuf::from("docs/MODELS.md")
}

fn default_published_url() -> String {
    "https://docs.ai.example.com/models".to_string()
}

/// External inputs used by the synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputsConfig {
    /// Speech clip fetched once per run for transcription tests.
    #[serde(default = "default_audio_clip_url")]
    pub audio_clip_url: String,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            audio_clip_url: default_audio_clip_url(),
        }
    }
}

fn default_audio_clip_url() -> String {
    "https://raw.githubusercontent.com/openai/whisper/main/tests/jfk.flac".to_string()
}

/// How license gates are answered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LicensePolicy {
    /// Ask the operator on the console.
    #[default]
    Prompt,
    /// Never accept; the gated test fails.
    Decline,
    /// Accept only for models listed in `license.allow`.
    Allow,
}

/// License-acceptance configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LicenseConfig {
    #[serde(default)]
    pub policy: LicensePolicy,

    /// Models whose license is pre-approved under the `allow` policy.
    #[serde(default)]
    pub allow: Vec<String>,
}

/// Run-level behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Exit non-zero when any test fails.
    #[serde(default)]
    pub strict: bool,
}
