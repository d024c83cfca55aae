//! Effective configuration with provenance
//!
//! Merges built-in defaults, the TOML config file and CLI flags, records
//! where each layer came from, then decodes and validates the typed
//! [`ClientConfig`].

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::defaults::{BuiltinDefaults, PresencePoint};
use super::merge::merge_layers;
use crate::host::{HttpConfig, RetryPolicy};
use crate::job::JobKind;
use crate::summary::{ExitCode, FailureKind};
use crate::timeout::PollConfig;

/// Where a layer came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// One merged layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// HTTP settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    pub connect_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

/// Service check settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSettings {
    /// Jobs to run, in any order; the check runs them in canonical order
    pub jobs: Vec<JobKind>,
    pub required_algorithm: String,
    /// Fail with a warning when a configured layer is not advertised
    pub verify_layers: bool,
    pub layers: Vec<String>,
    pub points: Vec<PresencePoint>,
    pub test_points: Vec<PresencePoint>,
}

impl CheckSettings {
    pub fn runs(&self, kind: JobKind) -> bool {
        self.jobs.contains(&kind)
    }
}

/// Typed client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub verbosity: u8,
    pub retry: RetryPolicy,
    pub poll: PollConfig,
    pub http: HttpSettings,
    pub check: CheckSettings,
}

impl Default for ClientConfig {
    /// Built-in values with no endpoint
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            endpoint: None,
            verbosity: defaults.verbosity,
            retry: defaults.retry,
            poll: defaults.poll,
            http: HttpSettings {
                connect_timeout_seconds: defaults.connect_timeout_seconds,
                request_timeout_seconds: defaults.request_timeout_seconds,
            },
            check: CheckSettings {
                jobs: defaults.jobs,
                required_algorithm: defaults.required_algorithm,
                verify_layers: defaults.verify_layers,
                layers: defaults.layers,
                points: defaults.points,
                test_points: defaults.test_points,
            },
        }
    }
}

impl ClientConfig {
    /// Validate bounds and cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ConfigError::Validation(format!(
                    "endpoint must be an http(s) URL, got {:?}",
                    endpoint
                )));
            }
        }

        if self.verbosity > 3 {
            return Err(ConfigError::Validation(format!(
                "verbosity must be in [0, 3], got {}",
                self.verbosity
            )));
        }

        // max_attempts must be in [1, 10]
        if !(1..=10).contains(&self.retry.max_attempts) {
            return Err(ConfigError::Validation(format!(
                "retry.max_attempts must be in [1, 10], got {}",
                self.retry.max_attempts
            )));
        }
        if self.retry.backoff_initial_ms > self.retry.backoff_max_ms {
            return Err(ConfigError::Validation(
                "retry.backoff_initial_ms must not exceed retry.backoff_max_ms".to_string(),
            ));
        }
        for pattern in &self.retry.extra_transient_patterns {
            Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!(
                    "retry.extra_transient_patterns: invalid pattern {:?}: {}",
                    pattern, e
                ))
            })?;
        }

        self.poll
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        // connect_timeout_seconds must be in (0, 300]
        if self.http.connect_timeout_seconds == 0 || self.http.connect_timeout_seconds > 300 {
            return Err(ConfigError::Validation(
                "http.connect_timeout_seconds must be in (0, 300]".to_string(),
            ));
        }
        if self.http.request_timeout_seconds == 0 || self.http.request_timeout_seconds > 3600 {
            return Err(ConfigError::Validation(
                "http.request_timeout_seconds must be in (0, 3600]".to_string(),
            ));
        }

        if self.check.required_algorithm.trim().is_empty() {
            return Err(ConfigError::Validation(
                "check.required_algorithm must not be empty".to_string(),
            ));
        }
        if self.check.layers.is_empty() {
            return Err(ConfigError::Validation(
                "check.layers must name at least one layer".to_string(),
            ));
        }
        if self.check.points.is_empty() || self.check.test_points.is_empty() {
            return Err(ConfigError::Validation(
                "check.points and check.test_points must not be empty".to_string(),
            ));
        }
        if let Some(kind) = self
            .check
            .jobs
            .iter()
            .find(|kind| kind.needs_model())
        {
            if !self.check.runs(JobKind::CreateModel) {
                return Err(ConfigError::Validation(format!(
                    "check.jobs: {} needs create_model to be enabled",
                    kind
                )));
            }
        }

        Ok(())
    }

    /// Endpoint, or the error the CLI reports when none was given
    pub fn require_endpoint(&self) -> Result<&str, ConfigError> {
        self.endpoint.as_deref().ok_or(ConfigError::MissingEndpoint)
    }

    /// HTTP transport settings for the configured endpoint
    pub fn http_config(&self) -> Result<HttpConfig, ConfigError> {
        Ok(HttpConfig {
            endpoint: self.require_endpoint()?.to_string(),
            connect_timeout_seconds: self.http.connect_timeout_seconds,
            request_timeout_seconds: self.http.request_timeout_seconds,
        })
    }
}

/// Effective configuration with provenance
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub created_at: DateTime<Utc>,
    /// Merged layers, before typing
    pub config: Value,
    /// Layers lowest precedence first
    pub sources: Vec<ConfigSource>,

    #[serde(skip)]
    pub client: ClientConfig,
}

impl EffectiveConfig {
    /// Merge defaults, the config file and CLI overrides, then type and
    /// validate the result
    ///
    /// An explicitly given file must exist; the default location is used
    /// only when present.
    pub fn build(
        config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        layers.push(BuiltinDefaults::default().to_value());
        sources.push(ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
        });

        let file = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };
        if let Some(path) = file {
            layers.push(load_toml_file(&path)?);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path.to_string_lossy().to_string()),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
            });
        }

        let merged = merge_layers(layers);
        let client: ClientConfig = serde_json::from_value(merged.clone())
            .map_err(|e| ConfigError::Parse(format!("invalid configuration: {}", e)))?;
        client.validate()?;

        Ok(Self {
            created_at: Utc::now(),
            config: merged,
            sources,
            client,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Merged value at a dotted path, e.g. `poll.timeout_seconds`
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.config, |node, key| node.get(key))
    }
}

/// `~/.config/omws/client.toml`
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/omws/client.toml"))
}

/// Read a TOML file straight into the JSON shape the layers merge in
fn load_toml_file(path: &Path) -> Result<Value, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    toml::from_str(&contents)
        .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing \"endpoint\" parameter")]
    MissingEndpoint,
}

impl ConfigError {
    pub fn failure_kind(&self) -> FailureKind {
        FailureKind::Config
    }

    pub fn exit_code(&self) -> ExitCode {
        self.failure_kind().exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn build_cli(cli: Value) -> Result<EffectiveConfig, ConfigError> {
        let empty = NamedTempFile::new().unwrap();
        EffectiveConfig::build(Some(empty.path()), Some(cli))
    }

    #[test]
    fn test_build_with_defaults_only() {
        let empty = NamedTempFile::new().unwrap();
        let config = EffectiveConfig::build(Some(empty.path()), None).unwrap();

        assert_eq!(config.get("retry.max_attempts"), Some(&json!(3)));
        assert_eq!(config.client.poll, PollConfig::default());
        assert_eq!(config.client.check.jobs, vec![JobKind::Experiment]);
        assert!(config.client.endpoint.is_none());
    }

    #[test]
    fn test_default_matches_builtin_layer() {
        let empty = NamedTempFile::new().unwrap();
        let config = EffectiveConfig::build(Some(empty.path()), None).unwrap();
        assert_eq!(config.client, ClientConfig::default());
    }

    #[test]
    fn test_build_with_cli_override() {
        let config = build_cli(json!({
            "endpoint": "http://localhost/omws",
            "poll": {"interval_seconds": 1}
        }))
        .unwrap();

        assert_eq!(config.client.poll.interval_seconds, 1);
        assert_eq!(config.client.poll.timeout_seconds, 1200);
        assert_eq!(config.client.require_endpoint().unwrap(), "http://localhost/omws");
    }

    #[test]
    fn test_validation_max_attempts() {
        let err = build_cli(json!({"retry": {"max_attempts": 0}})).unwrap_err();
        assert!(err.to_string().contains("retry.max_attempts"));

        let err = build_cli(json!({"retry": {"max_attempts": 11}})).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::Unknown);
    }

    #[test]
    fn test_validation_poll_bounds() {
        let err = build_cli(json!({"poll": {"interval_seconds": 30, "timeout_seconds": 10}}))
            .unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));
    }

    #[test]
    fn test_validation_bad_pattern() {
        let err = build_cli(json!({"retry": {"extra_transient_patterns": ["(oops"]}}))
            .unwrap_err();
        assert!(err.to_string().contains("extra_transient_patterns"));
    }

    #[test]
    fn test_validation_model_dependency() {
        let err = build_cli(json!({"check": {"jobs": ["test_model"]}})).unwrap_err();
        assert!(err.to_string().contains("test_model needs create_model"));

        assert!(build_cli(json!({"check": {"jobs": ["create_model", "test_model"]}})).is_ok());
    }

    #[test]
    fn test_unknown_job_kind_is_parse_error() {
        let err = build_cli(json!({"check": {"jobs": ["garp"]}})).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_endpoint_scheme() {
        let err = build_cli(json!({"endpoint": "localhost/omws"})).unwrap_err();
        assert!(err.to_string().contains("endpoint"));
    }

    #[test]
    fn test_missing_endpoint() {
        let config = build_cli(json!({})).unwrap();
        let err = config.client.http_config().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEndpoint));
        assert_eq!(err.to_string(), "Missing \"endpoint\" parameter");
    }

    #[test]
    fn test_load_toml_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "endpoint = \"https://example.org/omws2\"").unwrap();
        writeln!(temp, "[poll]").unwrap();
        writeln!(temp, "timeout_seconds = 600").unwrap();
        writeln!(temp, "[check]").unwrap();
        writeln!(temp, "jobs = [\"create_model\", \"sample_points\"]").unwrap();

        let config = EffectiveConfig::build(Some(temp.path()), None).unwrap();

        assert_eq!(config.get("poll.timeout_seconds"), Some(&json!(600)));
        assert_eq!(config.get("poll.interval_seconds"), Some(&json!(5)));
        assert_eq!(config.get("endpoint"), Some(&json!("https://example.org/omws2")));
        assert!(config.get("poll.missing").is_none());
        assert_eq!(
            config.client.check.jobs,
            vec![JobKind::CreateModel, JobKind::SamplePoints]
        );
    }

    #[test]
    fn test_cli_beats_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "verbosity = 1").unwrap();

        let config =
            EffectiveConfig::build(Some(temp.path()), Some(json!({"verbosity": 3}))).unwrap();
        assert_eq!(config.client.verbosity, 3);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = EffectiveConfig::build(Some(Path::new("/nonexistent/omws.toml")), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_sources_tracked() {
        let temp = NamedTempFile::new().unwrap();
        let config = EffectiveConfig::build(Some(temp.path()), Some(json!({}))).unwrap();

        let origins: Vec<_> = config.sources.iter().map(|s| s.origin.clone()).collect();
        assert_eq!(
            origins,
            vec![ConfigOrigin::Builtin, ConfigOrigin::File, ConfigOrigin::Cli]
        );
        assert!(config.to_json().unwrap().contains("\"origin\": \"file\""));
    }
}
