use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde_json::json;
use tokio::sync::OnceCell;

use super::{DeferredInput, Payload, SynthError, media::pcm_sine_wave};

/// Resolves deferred audio inputs.
///
/// The speech clip is downloaded on first use and shared by every later test
/// in the run. Concurrent first uses wait on a single download.
pub struct AudioSource {
    http: reqwest::Client,
    clip_url: String,
    clip: OnceCell<Bytes>,
}

impl AudioSource {
    pub fn new(http: reqwest::Client, clip_url: impl Into<String>) -> Self {
        Self {
            http,
            clip_url: clip_url.into(),
            clip: OnceCell::new(),
        }
    }

    pub fn clip_url(&self) -> &str {
        &self.clip_url
    }

    pub fn is_cached(&self) -> bool {
        self.clip.initialized()
    }

    /// The speech clip, fetched at most once.
    pub async fn clip(&self) -> Result<Bytes, SynthError> {
        self.clip
            .get_or_try_init(|| self.fetch_clip())
            .await
            .cloned()
    }

    pub async fn resolve(&self, input: &DeferredInput) -> Result<Payload, SynthError> {
        match input {
            DeferredInput::ClipAudio => {
                let clip = self.clip().await?;
                Ok(Payload::Json(json!({"audio": clip.to_vec()})))
            }
            DeferredInput::PcmTone {
                frequency_hz,
                duration_ms,
                sample_rate,
            } => {
                let pcm = pcm_sine_wave(*frequency_hz, *duration_ms, *sample_rate);
                Ok(Payload::Json(json!({
                    "audio": STANDARD.encode(pcm),
                    "encoding": "linear16",
                    "sample_rate": sample_rate,
                })))
            }
        }
    }

    async fn fetch_clip(&self) -> Result<Bytes, SynthError> {
        tracing::info!(url = %self.clip_url, "Fetching audio clip");

        let response = self
            .http
            .get(&self.clip_url)
            .send()
            .await
            .map_err(|e| SynthError::ClipFetch {
                url: self.clip_url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SynthError::ClipStatus {
                url: self.clip_url.clone(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| SynthError::ClipFetch {
            url: self.clip_url.clone(),
            source: e,
        })?;
        if bytes.is_empty() {
            return Err(SynthError::EmptyClip {
                url: self.clip_url.clone(),
            });
        }

        tracing::debug!(url = %self.clip_url, bytes = bytes.len(), "Cached audio clip");
        Ok(bytes)
    }
}
