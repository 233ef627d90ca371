//! Configuration loading, validation, and management for DentAssist.
//!
//! Loads configuration from `~/.dentassist/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.dentassist/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider name (used in logs and diagnostics)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used by the conversational agent
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for image analysis
    #[serde(default = "default_model")]
    pub vision_model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Agent dispatcher configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Session retention configuration
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Image analysis endpoint configuration
    #[serde(default)]
    pub analyze: AnalyzeConfig,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai/".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}

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
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("vision_model", &self.vision_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("gateway", &self.gateway)
            .field("agent", &self.agent)
            .field("sessions", &self.sessions)
            .field("analyze", &self.analyze)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Maximum request body size (uploads included), in MiB
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit_mb() -> usize {
    20
}

/// Upper bound accepted for `gateway.body_limit_mb`.
pub const MAX_BODY_LIMIT_MB: usize = 1024;

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit_mb: default_body_limit_mb(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model round-trips (tool calls included) per query
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    /// Upper bound on one dispatch, in seconds (0 = no bound)
    #[serde(default)]
    pub timeout_secs: u64,

    /// Send prior session turns to the model along with the new query
    #[serde(default)]
    pub replay_history: bool,
}

fn default_max_tool_iterations() -> u32 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            timeout_secs: 0,
            replay_history: false,
        }
    }
}

/// Bounded retention for in-memory sessions. A zero disables that bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,

    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_max_turns() -> usize {
    200
}
fn default_idle_ttl_secs() -> u64 {
    24 * 60 * 60
}
fn default_max_sessions() -> usize {
    10_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            idle_ttl_secs: default_idle_ttl_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

/// How uploaded images reach the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzeMode {
    /// Base64-inline every uploaded image as a data URL.
    #[default]
    Inline,
    /// Save uploads to disk and hand the model a URL served by `/files`.
    LocalUrl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeConfig {
    #[serde(default)]
    pub mode: AnalyzeMode,

    /// Where uploads are stored in `local_url` mode (and served from)
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Externally reachable base URL of the gateway; defaults to
    /// `http://<host>:<port>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
}

fn default_upload_dir() -> PathBuf {
    std::env::temp_dir().join("dental_uploads")
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            mode: AnalyzeMode::default(),
            upload_dir: default_upload_dir(),
            public_base_url: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.dentassist/config.toml).
    ///
    /// Also checks environment variables:
    /// - `DENTASSIST_API_KEY` (highest priority), `GEMINI_API_KEY`, `OPENAI_API_KEY`
    /// - `DENTASSIST_BASE_URL`, `DENTASSIST_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_overrides(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_overrides(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
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

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = var("DENTASSIST_API_KEY")
                .or_else(|| var("GEMINI_API_KEY"))
                .or_else(|| var("OPENAI_API_KEY"))
                .filter(|k| !k.trim().is_empty());
        }

        if let Some(base_url) = var("DENTASSIST_BASE_URL") {
            self.base_url = base_url;
        }

        if let Some(model) = var("DENTASSIST_MODEL") {
            self.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".dentassist")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_iterations must be at least 1".into(),
            ));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }

        if self.gateway.body_limit_mb == 0 || self.gateway.body_limit_mb > MAX_BODY_LIMIT_MB {
            return Err(ConfigError::ValidationError(format!(
                "gateway.body_limit_mb must be between 1 and {MAX_BODY_LIMIT_MB}"
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Base URL the model uses to fetch uploaded files in `local_url` mode.
    pub fn public_base_url(&self) -> String {
        self.analyze
            .public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.gateway.host, self.gateway.port))
            .trim_end_matches('/')
            .to_string()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            vision_model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            gateway: GatewayConfig::default(),
            agent: AgentConfig::default(),
            sessions: SessionConfig::default(),
            analyze: AnalyzeConfig::default(),
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
