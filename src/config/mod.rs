//! Configuration module for the model audit.
//!
//! The audit runs with no configuration file at all. When one is present it is
//! TOML, with support for environment variable interpolation using
//! `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [endpoint]
//! base_url = "https://gateway.internal/v1"
//! api_key = "${MODEL_AUDIT_API_KEY}"
//!
//! [retry]
//! max_retries = 5
//!
//! [license]
//! policy = "allow"
//! allow = ["llama-3.2-11b-vision"]
//! ```
//!
//! Precedence is defaults < file < environment < command line.

mod observability;
mod retry;
mod sources;

use std::path::Path;

pub use observability::*;
pub use retry::*;
use serde::{Deserialize, Serialize};
pub use sources::*;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "model-audit.toml";

/// Environment variable overriding `endpoint.base_url`.
pub const BASE_URL_ENV: &str = "MODEL_AUDIT_BASE_URL";

/// Environment variable overriding `endpoint.api_key`.
pub const API_KEY_ENV: &str = "MODEL_AUDIT_API_KEY";

/// Root configuration for the audit.
///
/// All sections are optional with defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Endpoint under test.
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Retry policy for live calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Model registry location.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Documentation sources.
    #[serde(default)]
    pub docs: DocsConfig,

    /// External inputs for payload synthesis.
    #[serde(default)]
    pub inputs: InputsConfig,

    /// License-gate handling.
    #[serde(default)]
    pub license: LicenseConfig,

    /// Run-level behavior.
    #[serde(default)]
    pub audit: RunConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AuditConfig {
    /// Load configuration for a run.
    ///
    /// Reads `explicit_path` if given, otherwise [`DEFAULT_CONFIG_FILE`] when it
    /// exists, otherwise starts from defaults. Environment overrides are applied
    /// and the result validated.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: AuditConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Apply `MODEL_AUDIT_BASE_URL` and `MODEL_AUDIT_API_KEY` when set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Some(base_url) = non_empty_env(BASE_URL_ENV) {
            self.endpoint.base_url = base_url;
        }
        if let Some(api_key) = non_empty_env(API_KEY_ENV) {
            self.endpoint.api_key = Some(api_key);
        }
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("endpoint.base_url", &self.endpoint.base_url)?;
        validate_http_url("docs.published_url", &self.docs.published_url)?;
        validate_http_url("inputs.audio_clip_url", &self.inputs.audio_clip_url)?;

        if self.retry.max_retries > 10 {
            return Err(ConfigError::Validation(format!(
                "retry.max_retries must be at most 10, got {}",
                self.retry.max_retries
            )));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(ConfigError::Validation(
                "retry.jitter must be between 0.0 and 1.0".into(),
            ));
        }
        if self.catalog.marker.trim().is_empty() {
            return Err(ConfigError::Validation(
                "catalog.marker must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Whether live calls can be made at all.
    pub fn has_api_key(&self) -> bool {
        self.endpoint
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ConfigError::Validation(format!("{field} is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Validation(format!(
            "{field} must use http or https, got '{other}'"
        ))),
    }
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    static ENV_VAR: std::sync::LazyLock<regex::Regex> =
        std::sync::LazyLock::new(|| regex::Regex::new(r"\$\{([^}]+)\}").unwrap());

    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in ENV_VAR.captures_iter(line) {
            let Some(whole) = cap.get(0) else { continue };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AuditConfig::from_str("").unwrap();
        assert_eq!(config.endpoint.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.catalog.marker, "MODEL_CATALOG");
        assert_eq!(config.license.policy, LicensePolicy::Prompt);
        assert!(!config.audit.strict);
        assert!(!config.has_api_key());
        config.validate().unwrap();
    }

    #[test]
    fn test_full_config() {
        let config = AuditConfig::from_str(
            r#"
            [endpoint]
            base_url = "http://localhost:8787/v1"
            api_key = "sk-test"
            timeout_secs = 30

            [retry]
            max_retries = 5
            base_delay_ms = 250

            [catalog]
            path = "registry/models.json"

            [license]
            policy = "allow"
            allow = ["llama-guard", "llama-vision"]

            [audit]
            strict = true

            [observability.logging]
            format = "pretty"
        "#,
        )
        .unwrap();

        assert_eq!(config.endpoint.base_url, "http://localhost:8787/v1");
        assert!(config.has_api_key());
        assert_eq!(config.endpoint.timeout_secs, 30);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 250);
        assert_eq!(config.retry.rate_limit_max_delay_ms, 30_000);
        assert_eq!(
            config.catalog.path,
            std::path::PathBuf::from("registry/models.json")
        );
        assert_eq!(config.license.policy, LicensePolicy::Allow);
        assert_eq!(config.license.allow.len(), 2);
        assert!(config.audit.strict);
        assert_eq!(config.observability.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = AuditConfig::from_str(
            r#"
            [endpoint]
            base_uri = "http://localhost"
        "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_rejects_non_http_base_url() {
        let config = AuditConfig::from_str(
            r#"
            [endpoint]
            base_url = "ftp://example.com"
        "#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("endpoint.base_url"));
    }

    #[test]
    fn test_validation_rejects_excessive_retries() {
        let config = AuditConfig::from_str("[retry]\nmax_retries = 50").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("AUDIT_TEST_API_KEY", Some("sk-secret"), || {
            let result = expand_env_vars("api_key = \"${AUDIT_TEST_API_KEY}\"").unwrap();
            assert_eq!(result, "api_key = \"sk-secret\"");
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# api_key = \"${AUDIT_NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# api_key = \"${AUDIT_NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_missing_env_var_is_error() {
        temp_env::with_var_unset("AUDIT_MISSING_VAR", || {
            let result = AuditConfig::from_str("[endpoint]\napi_key = \"${AUDIT_MISSING_VAR}\"");
            assert!(
                matches!(result, Err(ConfigError::EnvVarNotFound(ref name)) if name == "AUDIT_MISSING_VAR")
            );
        });
    }

    #[test]
    #[serial]
    fn test_env_overrides_file_values() {
        temp_env::with_vars(
            [
                (BASE_URL_ENV, Some("http://127.0.0.1:9000/v1")),
                (API_KEY_ENV, Some("from-env")),
            ],
            || {
                let mut config =
                    AuditConfig::from_str("[endpoint]\nbase_url = \"http://file/v1\"").unwrap();
                config.apply_env_overrides();
                assert_eq!(config.endpoint.base_url, "http://127.0.0.1:9000/v1");
                assert_eq!(config.endpoint.api_key.as_deref(), Some("from-env"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_blank_env_does_not_override() {
        temp_env::with_vars([(BASE_URL_ENV, Some("  ")), (API_KEY_ENV, None::<&str>)], || {
            let mut config = AuditConfig::default();
            config.apply_env_overrides();
            assert_eq!(config.endpoint.base_url, DEFAULT_BASE_URL);
            assert!(!config.has_api_key());
        });
    }

    #[test]
    #[serial]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.toml");
        std::fs::write(&path, "[retry]\nmax_retries = 1\n").unwrap();

        temp_env::with_vars([(BASE_URL_ENV, None::<&str>), (API_KEY_ENV, None)], || {
            let config = AuditConfig::load(Some(&path)).unwrap();
            assert_eq!(config.retry.max_retries, 1);
        });
    }

    #[test]
    fn test_load_missing_explicit_file_is_io_error() {
        let result = AuditConfig::load(Some(Path::new("/nonexistent/model-audit.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_, _))));
    }
}
