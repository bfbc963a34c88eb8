//! Configuration loading, validation, and management for Veritas.
//!
//! Loads configuration from `~/.veritas/config.toml` with environment
//! variable overrides. Validates all settings at startup, and refuses to
//! serve turns unless both provider API keys are present.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables consulted for the search provider key, in priority order.
pub const SEARCH_KEY_ENV: [&str; 2] = ["VERITAS_SEARCH_API_KEY", "TAVILY_API_KEY"];

/// Environment variables consulted for the reasoning provider key, in priority order.
pub const REASONING_KEY_ENV: [&str; 2] = ["VERITAS_REASONING_API_KEY", "GROQ_API_KEY"];

/// The root configuration structure.
///
/// Maps directly to `~/.veritas/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web search provider settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Reasoning (LLM) provider settings
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Outbound context assembly settings
    #[serde(default)]
    pub context: ContextConfig,

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

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_url")]
    pub api_url: String,

    /// Forwarded to the provider when set; provider default otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_search_url() -> String {
    "https://api.tavily.com".into()
}
fn default_search_timeout() -> u64 {
    60
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_search_url(),
            max_results: None,
            timeout_secs: default_search_timeout(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("max_results", &self.max_results)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL (the `/chat/completions` suffix is appended).
    #[serde(default = "default_reasoning_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_reasoning_timeout")]
    pub timeout_secs: u64,
}

fn default_reasoning_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_model() -> String {
    "llama-3.3-70b-versatile".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_reasoning_timeout() -> u64 {
    120
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_reasoning_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_reasoning_timeout(),
        }
    }
}

impl std::fmt::Debug for ReasoningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// How many trailing transcript turns are sent with each request.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Per-item evidence rendering; `{snippet}` and `{url}` are substituted.
    #[serde(default = "default_evidence_template")]
    pub evidence_template: String,

    /// Joins rendered evidence items.
    #[serde(default = "default_evidence_separator")]
    pub evidence_separator: String,

    /// Replace the built-in verification protocol entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_window_size() -> usize {
    5
}
fn default_evidence_template() -> String {
    "- {snippet} (URL: {url})".into()
}
fn default_evidence_separator() -> String {
    "\n".into()
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            evidence_template: default_evidence_template(),
            evidence_separator: default_evidence_separator(),
            system_prompt_override: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Sessions held in memory before the oldest is evicted.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Origins allowed by CORS in addition to the gateway's own.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8501
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_sessions() -> usize {
    1_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_sessions: default_max_sessions(),
            allowed_origins: vec![],
        }
    }
}

/// Both provider keys, present and non-empty.
#[derive(Clone)]
pub struct Secrets {
    pub search_api_key: String,
    pub reasoning_api_key: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("search_api_key", &"[REDACTED]")
            .field("reasoning_api_key", &"[REDACTED]")
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.veritas/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_path())
    }

    /// Load from `path` and then apply environment overrides.
    ///
    /// Keys already set in the file win over the environment:
    /// - `VERITAS_SEARCH_API_KEY`, then `TAVILY_API_KEY`
    /// - `VERITAS_REASONING_API_KEY`, then `GROQ_API_KEY`
    /// - `VERITAS_MODEL` always overrides the model
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first_set = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
        };

        if self.search.api_key.is_none() {
            self.search.api_key = first_set(&SEARCH_KEY_ENV[..]);
        }
        if self.reasoning.api_key.is_none() {
            self.reasoning.api_key = first_set(&REASONING_KEY_ENV[..]);
        }
        if let Some(model) = first_set(&["VERITAS_MODEL"][..]) {
            self.reasoning.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".veritas")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.reasoning.temperature) {
            return Err(ConfigError::ValidationError(
                "reasoning.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.reasoning.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "reasoning.model must not be empty".into(),
            ));
        }

        if self.context.window_size == 0 {
            return Err(ConfigError::ValidationError(
                "context.window_size must be at least 1".into(),
            ));
        }

        for placeholder in ["{snippet}", "{url}"] {
            if !self.context.evidence_template.contains(placeholder) {
                return Err(ConfigError::ValidationError(format!(
                    "context.evidence_template must contain {placeholder}"
                )));
            }
        }

        if self.gateway.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_sessions must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Both API keys, or `ConfigurationMissing` naming every absent one.
    pub fn require_secrets(&self) -> Result<Secrets, ConfigError> {
        let present = |key: &Option<String>| key.clone().filter(|k| !k.trim().is_empty());

        let search = present(&self.search.api_key);
        let reasoning = present(&self.reasoning.api_key);

        match (search, reasoning) {
            (Some(search_api_key), Some(reasoning_api_key)) => Ok(Secrets {
                search_api_key,
                reasoning_api_key,
            }),
            (search, reasoning) => {
                let mut missing = Vec::new();
                if search.is_none() {
                    missing.push(MissingSecret::SearchApiKey);
                }
                if reasoning.is_none() {
                    missing.push(MissingSecret::ReasoningApiKey);
                }
                Err(ConfigError::ConfigurationMissing(missing))
            }
        }
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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

/// A required secret that was not configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingSecret {
    SearchApiKey,
    ReasoningApiKey,
}

impl MissingSecret {
    /// Config file key that would provide this secret.
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::SearchApiKey => "search.api_key",
            Self::ReasoningApiKey => "reasoning.api_key",
        }
    }

    /// Environment variables that would provide this secret.
    pub fn env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::SearchApiKey => &SEARCH_KEY_ENV,
            Self::ReasoningApiKey => &REASONING_KEY_ENV,
        }
    }
}

impl std::fmt::Display for MissingSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (env: {})", self.config_key(), self.env_vars().join(" or "))
    }
}

fn join_missing(missing: &[MissingSecret]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
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

    #[error("Configuration missing: {}", join_missing(.0))]
    ConfigurationMissing(Vec<MissingSecret>),
}
