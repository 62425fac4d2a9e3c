/// Errors from live model calls.
///
/// Non-2xx responses that are neither rate limits nor license gates are not
/// errors; they are returned as [`super::ApiResponse`] for the validator to judge.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Invalid request for model '{model}': {reason}")]
    InvalidRequest { model: String, reason: String },

    #[error("Request for model '{model}' failed after {attempts} attempts: {source}")]
    Transport {
        model: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error(
        "License for model '{model}' was declined ({}); request was not retried",
        .license_url.as_deref().unwrap_or("no license URL given")
    )]
    LicenseDeclined {
        model: String,
        license_url: Option<String>,
    },

    #[error("License agreement for model '{model}' failed: {reason}")]
    LicenseAgreementFailed { model: String, reason: String },
}

impl ClientError {
    /// Whether the failure came from a license gate rather than the network.
    pub fn is_license_gate(&self) -> bool {
        matches!(
            self,
            Self::LicenseDeclined { .. } | Self::LicenseAgreementFailed { .. }
        )
    }
}
