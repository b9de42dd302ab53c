//! Configuration loading, validation, and management for KnoRoute.
//!
//! Loads configuration from `~/.knoroute/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound on retries a caller may request per query.
pub const MAX_RETRIES_LIMIT: u32 = 5;

/// The root configuration structure.
///
/// Maps directly to `~/.knoroute/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the reasoning provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Reasoning service configuration
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Retrieval loop configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Knowledge store configuration
    #[serde(default)]
    pub stores: StoresConfig,

    /// Insight feedback configuration
    #[serde(default)]
    pub feedback: FeedbackConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("reasoning", &self.reasoning)
            .field("retrieval", &self.retrieval)
            .field("stores", &self.stores)
            .field("feedback", &self.feedback)
            .field("gateway", &self.gateway)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// "openai", "openrouter", "ollama", "heuristic", or a custom name with `api_url`
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Base URL override for OpenAI-compatible endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Per-call timeout for the provider
    #[serde(default = "default_reasoning_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_reasoning_timeout() -> u64 {
    60
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_url: None,
            timeout_secs: default_reasoning_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Documents fetched per selected store per round
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Retries when a query does not override it
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fingerprint only the first N normalized characters (None = whole content)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_prefix_chars: Option<usize>,

    /// Treat a failing store as empty for the round instead of aborting
    #[serde(default)]
    pub degrade_on_store_error: bool,

    /// Overall deadline for one query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

fn default_top_k() -> usize {
    5
}
fn default_max_retries() -> u32 {
    3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_retries: default_max_retries(),
            fingerprint_prefix_chars: None,
            degrade_on_store_error: false,
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoresConfig {
    /// "memory" (volatile) or "file" (JSONL per category)
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Directory for file-backed stores (default: ~/.knoroute/stores)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

fn default_store_backend() -> String {
    "file".into()
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            data_dir: None,
        }
    }
}

impl StoresConfig {
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("stores"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Write learned insights back to the memory store
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Only write insights from answers at least this confident
    #[serde(default)]
    pub min_confidence: f32,
}

fn default_true() -> bool {
    true
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.knoroute/config.toml).
    ///
    /// Environment overrides, highest priority first:
    /// - `KNOROUTE_API_KEY`, then `OPENAI_API_KEY` (only when no key is configured)
    /// - `KNOROUTE_PROVIDER`, `KNOROUTE_MODEL`, `KNOROUTE_MAX_RETRIES`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with(&config_path, |key| std::env::var(key).ok())
    }

    /// Load a file, apply overrides from `lookup`, and validate the result once.
    pub fn load_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env(lookup)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides through `lookup`, then validate.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            self.api_key = lookup("KNOROUTE_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("KNOROUTE_PROVIDER") {
            self.reasoning.provider = provider;
        }

        if let Some(model) = lookup("KNOROUTE_MODEL") {
            self.reasoning.model = model;
        }

        if let Some(raw) = lookup("KNOROUTE_MAX_RETRIES") {
            self.retrieval.max_retries = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("KNOROUTE_MAX_RETRIES is not a number: {raw}"))
            })?;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".knoroute")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.reasoning.temperature) {
            return Err(ConfigError::ValidationError(
                "reasoning.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.retrieval.top_k == 0 || self.retrieval.top_k > 50 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be between 1 and 50".into(),
            ));
        }

        if self.retrieval.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.max_retries must be at most {MAX_RETRIES_LIMIT}"
            )));
        }

        if !matches!(self.stores.backend.as_str(), "memory" | "file") {
            return Err(ConfigError::ValidationError(format!(
                "stores.backend must be \"memory\" or \"file\", got \"{}\"",
                self.stores.backend
            )));
        }

        if !(0.0..=1.0).contains(&self.feedback.min_confidence) {
            return Err(ConfigError::ValidationError(
                "feedback.min_confidence must be between 0.0 and 1.0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            reasoning: ReasoningConfig::default(),
            retrieval: RetrievalConfig::default(),
            stores: StoresConfig::default(),
            feedback: FeedbackConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.max_retries, 3);
        assert_eq!(config.gateway.port, 8000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.reasoning.model, config.reasoning.model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.reasoning.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn max_retries_above_limit_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.max_retries = 6;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
        config.retrieval.max_retries = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_store_backend_rejected() {
        let mut config = AppConfig::default();
        config.stores.backend = "qdrant".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.reasoning.provider, "openai");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[retrieval]\ntop_k = 8\ndegrade_on_store_error = true\n\n[stores]\nbackend = \"memory\""
        )
        .unwrap();
        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.retrieval.max_retries, 3);
        assert!(config.retrieval.degrade_on_store_error);
        assert_eq!(config.stores.backend, "memory");
        assert!(config.feedback.enabled);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retrieval\ntop_k = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply_in_priority_order() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("OPENAI_API_KEY", "sk-openai"),
                ("KNOROUTE_API_KEY", "sk-knoroute"),
                ("KNOROUTE_MODEL", "gpt-4o"),
                ("KNOROUTE_MAX_RETRIES", "2"),
            ]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-knoroute"));
        assert_eq!(config.reasoning.model, "gpt-4o");
        assert_eq!(config.retrieval.max_retries, 2);
    }

    #[test]
    fn configured_api_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(env(&[("OPENAI_API_KEY", "from-env")])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn env_override_corrects_out_of_range_file_value() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retrieval]\nmax_retries = 9").unwrap();

        assert!(AppConfig::load_from(file.path()).is_err());
        assert!(AppConfig::load_with(file.path(), env(&[])).is_err());

        let config = AppConfig::load_with(file.path(), env(&[("KNOROUTE_MAX_RETRIES", "2")])).unwrap();
        assert_eq!(config.retrieval.max_retries, 2);
    }

    #[test]
    fn env_max_retries_is_validated() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[("KNOROUTE_MAX_RETRIES", "9")])).is_err());
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[("KNOROUTE_MAX_RETRIES", "lots")])).is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret-value".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("8000"));
    }
}
