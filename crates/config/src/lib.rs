//! Configuration loading, validation, and management for Mailwright.
//!
//! Configuration is read from the first of:
//! 1. the file named by `MAILWRIGHT_CONFIG`
//! 2. `./mailwright.toml` in the working directory
//! 3. `~/.mailwright/config.toml`
//!
//! Environment variables override the file. Everything is resolved once at
//! startup; [`AppConfig::reload`] is the explicit hook for resolving again
//! (for example after an API key was exported into a running service).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Name of the project-local settings file.
pub const LOCAL_CONFIG_FILE: &str = "mailwright.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "MAILWRIGHT_CONFIG";

/// Generic API key variable, honoured for every provider.
pub const API_KEY_ENV: &str = "MAILWRIGHT_API_KEY";

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Which model backend to use
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name passed to the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Cap on generated tokens (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Mail account configuration
    #[serde(default)]
    pub mail: MailConfig,

    /// The file this configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-flash-latest".into()
}
fn default_temperature() -> f32 {
    0.7
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
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("providers", &self.providers)
            .field("gateway", &self.gateway)
            .field("mail", &self.mail)
            .field("source", &self.source)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS origins. `"*"` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}
fn default_allowed_origins() -> Vec<String> {
    vec!["*".into()]
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Google OAuth client secrets (downloaded from the Cloud console)
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    /// Where the authorized user token is cached
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,

    /// Optional From address; Gmail fills in the account address otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    /// Gmail REST API base URL
    #[serde(default = "default_gmail_api_url")]
    pub api_url: String,
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}
fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}
fn default_gmail_api_url() -> String {
    "https://gmail.googleapis.com/gmail/v1".into()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_path: default_token_path(),
            sender: None,
            api_url: default_gmail_api_url(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the resolved path, then apply environment
    /// overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Resolve configuration again from scratch.
    ///
    /// Identical to [`AppConfig::load`]; named separately so call sites that
    /// re-resolve at runtime read as such.
    pub fn reload() -> Result<Self, ConfigError> {
        tracing::info!("Re-resolving configuration");
        Self::load()
    }

    /// Load configuration from a specific file path (no environment overrides).
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Apply environment overrides using the given variable lookup.
    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = non_empty(env("MAILWRIGHT_PROVIDER")) {
            self.provider = provider;
        }
        if let Some(model) = non_empty(env("MAILWRIGHT_MODEL")) {
            self.model = model;
        }
        if self.configured_key(&self.provider).is_none() {
            let from_env = key_env_vars(&self.provider)
                .iter()
                .find_map(|var| non_empty(env(var)));
            if let Some(key) = from_env {
                self.api_key = Some(key);
            }
        }
    }

    /// The API key for the active provider, if one is available.
    pub fn api_key(&self) -> Option<&str> {
        self.configured_key(&self.provider)
    }

    /// Check if an API key is available for the active provider.
    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    /// Settings for the active provider, if any were configured.
    pub fn provider_config(&self) -> Option<&ProviderConfig> {
        self.providers.get(&self.provider)
    }

    /// The model name to request, honouring a per-provider override.
    pub fn effective_model(&self) -> &str {
        self.provider_config()
            .and_then(|p| p.model.as_deref())
            .unwrap_or(&self.model)
    }

    fn configured_key(&self, provider: &str) -> Option<&str> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.as_deref())
            .or(self.api_key.as_deref())
            .filter(|k| !k.trim().is_empty())
    }

    /// Resolve which config file to use.
    pub fn config_path() -> PathBuf {
        if let Some(explicit) = non_empty(std::env::var(CONFIG_PATH_ENV).ok()) {
            return PathBuf::from(explicit);
        }
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return local;
        }
        Self::config_dir().join("config.toml")
    }

    /// Get the per-user configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".mailwright")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.provider.trim().is_empty() {
            return Err(ConfigError::ValidationError("provider must not be empty".into()));
        }

        if self.gateway.allowed_origins.is_empty() {
            return Err(ConfigError::ValidationError(
                "gateway.allowed_origins must list at least one origin (use \"*\" for any)".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `onboard` command).
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
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            providers: HashMap::new(),
            gateway: GatewayConfig::default(),
            mail: MailConfig::default(),
            source: None,
        }
    }
}

/// Environment variables consulted for `provider`'s API key, highest priority first.
pub fn key_env_vars(provider: &str) -> &'static [&'static str] {
    match provider {
        "gemini" | "google" => &[API_KEY_ENV, "GEMINI_API_KEY", "GOOGLE_API_KEY"],
        "openai" => &[API_KEY_ENV, "OPENAI_API_KEY"],
        "openrouter" => &[API_KEY_ENV, "OPENROUTER_API_KEY"],
        _ => &[API_KEY_ENV],
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
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
