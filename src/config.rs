//! Runtime configuration.
//!
//! Layering, lowest to highest: built-in defaults, an optional TOML file
//! (`HOOKLINE_CONFIG`, else `hookline.toml` when present), then environment
//! variables. A `.env` file in the working directory is loaded first.

use crate::ratelimit::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

const DEFAULT_CONFIG_FILE: &str = "hookline.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("invalid config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub generation: GenerationConfig,
    pub storage: StorageConfig,
    pub corpus: CorpusConfig,
    pub identity: IdentityConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub limit: u32,
    pub window_secs: u64,
    pub redis_url: Option<String>,
    pub key_prefix: String,
    pub failure_policy: FailurePolicy,
    pub store_timeout_ms: u64,
}

#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct CorpusConfig {
    pub path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    #[default]
    Forwarded,
    Tokens,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct IdentityConfig {
    pub mode: IdentityMode,
    /// bearer token → user id, used in `tokens` mode
    pub tokens: HashMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            window_secs: 86_400,
            redis_url: None,
            key_prefix: "hookline".to_string(),
            failure_policy: FailurePolicy::FailClosed,
            store_timeout_ms: 250,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: String::new(),
            model: "claude-3-5-sonnet-20240620".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            request_timeout_secs: 120,
        }
    }
}

// Keeps the API key out of logs.
impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl StorageConfig {
    pub fn saved_posts_log(&self) -> PathBuf {
        self.data_dir.join("saved_posts.log")
    }
}

impl Config {
    /// Full startup load: `.env`, config file, environment, validation.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file = match std::env::var("HOOKLINE_CONFIG") {
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
        };

        let mut config = match &file {
            Some(path) => Self::from_toml_file(path)?,
            None => {
                info!("no config file, using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Applies environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOOKLINE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_var(&lookup, "HOOKLINE_PORT")? {
            self.server.port = port;
        }
        if let Some(dir) = lookup("HOOKLINE_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("HOOKLINE_CORPUS") {
            self.corpus.path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.rate_limit.redis_url = Some(url);
        }
        if let Some(limit) = parse_var(&lookup, "HOOKLINE_RATE_LIMIT")? {
            self.rate_limit.limit = limit;
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.generation.api_key = key;
        }
        if let Some(model) = lookup("HOOKLINE_MODEL") {
            self.generation.model = model;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.limit == 0 {
            return Err(invalid("rate_limit.limit", "must be at least 1"));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(invalid("rate_limit.window_secs", "must be at least 1"));
        }
        if self.rate_limit.store_timeout_ms == 0 {
            return Err(invalid("rate_limit.store_timeout_ms", "must be at least 1"));
        }
        if let Some(redis_url) = &self.rate_limit.redis_url {
            url::Url::parse(redis_url).map_err(|e| invalid("rate_limit.redis_url", e))?;
        }
        url::Url::parse(&self.generation.api_url)
            .map_err(|e| invalid("generation.api_url", e))?;
        if self.generation.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("ANTHROPIC_API_KEY"));
        }
        if !(0.0..=1.0).contains(&self.generation.temperature) {
            return Err(invalid("generation.temperature", "must be within 0.0..=1.0"));
        }
        if self.identity.mode == IdentityMode::Tokens && self.identity.tokens.is_empty() {
            return Err(invalid("identity.tokens", "tokens mode needs at least one token"));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: impl Display) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| raw.trim().parse::<T>().map_err(|e| invalid(key, e)))
        .transpose()
}
