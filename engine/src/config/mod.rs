//! Configuration management
//!
//! This module handles loading, validation, and management of the Lectern
//! configuration. Configuration is stored in TOML format at
//! ~/.lectern/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Data directory, log level
//! - **llm**: Inference provider settings
//! - **pipeline**: Chunked digest pipeline settings
//! - **gateway**: Dispatch timeout
//! - **limits**: Per-endpoint rate-limit policies
//!
//! # Path Expansion
//!
//! The configuration system automatically expands ~ to the user's home
//! directory and creates the data directory if it doesn't exist.

use sdk::errors::CoreError;
use sdk::types::RateLimitPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
///
/// Represents the complete Lectern configuration loaded from
/// ~/.lectern/config.toml. Every section has serde defaults so a partial
/// (or missing) file still produces a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Inference provider configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Chunked digest pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Gateway dispatch settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Rate-limit policies per endpoint name
    #[serde(default = "default_limits")]
    pub limits: HashMap<String, RateLimitPolicy>,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Inference provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider kind: "openai" (any OpenAI-compatible endpoint) or "anthropic"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL of the provider API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with each request
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Cap on generated tokens per inference call
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Chunked digest pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-chunk input budget in characters.
    ///
    /// Character length is a proxy for the model's token budget; the bound
    /// is approximate, not exact. A single whitespace-delimited token longer
    /// than the budget is kept whole and becomes its own oversized chunk.
    #[serde(default = "default_chunk_budget")]
    pub chunk_budget_chars: usize,
}

/// Gateway dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Wall-clock timeout for one actor round trip, in seconds
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_timeout_secs: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.lectern/data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "LECTERN_API_KEY".to_string()
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_request_timeout() -> u64 {
    60
}

fn default_chunk_budget() -> usize {
    12_000
}

fn default_dispatch_timeout() -> u64 {
    30
}

/// Built-in rate-limit policies, overridable per endpoint in config
fn default_limits() -> HashMap<String, RateLimitPolicy> {
    HashMap::from([
        ("upload".to_string(), RateLimitPolicy::new(10, 300)),
        ("chat".to_string(), RateLimitPolicy::new(30, 60)),
        ("summarize".to_string(), RateLimitPolicy::new(5, 300)),
        ("extract".to_string(), RateLimitPolicy::new(5, 300)),
    ])
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_output_tokens: default_max_output_tokens(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_budget_chars: default_chunk_budget(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout_secs: default_dispatch_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            gateway: GatewayConfig::default(),
            limits: default_limits(),
        }
    }
}

impl Config {
    /// Default configuration file location: ~/.lectern/config.toml
    pub fn default_path() -> Result<PathBuf, CoreError> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Config("Could not determine home directory".to_string()))?;
        Ok(home.join(".lectern").join("config.toml"))
    }

    /// Load configuration from the default location, creating a default
    /// file if none exists yet.
    pub fn load_or_create() -> Result<Self, CoreError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            let config = Config::default();
            config.save_to_path(&path)?;
            Ok(config)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, CoreError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| CoreError::Config(format!("Failed to parse config: {}", e)))?;

        config.core.data_dir = expand_tilde(&config.core.data_dir)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a specific path, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| CoreError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration values
    ///
    /// Every configured policy must have a positive limit and window; a
    /// zero-width window would make the fixed-window arithmetic meaningless.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (endpoint, policy) in &self.limits {
            if policy.max_requests == 0 {
                return Err(CoreError::Config(format!(
                    "limits.{}: max_requests must be > 0",
                    endpoint
                )));
            }
            if policy.window_secs == 0 {
                return Err(CoreError::Config(format!(
                    "limits.{}: window_secs must be > 0",
                    endpoint
                )));
            }
        }
        if self.pipeline.chunk_budget_chars == 0 {
            return Err(CoreError::Config(
                "pipeline.chunk_budget_chars must be > 0".to_string(),
            ));
        }
        if self.gateway.dispatch_timeout_secs == 0 {
            return Err(CoreError::Config(
                "gateway.dispatch_timeout_secs must be > 0".to_string(),
            ));
        }
        match self.llm.provider.as_str() {
            "openai" | "anthropic" => {}
            other => {
                return Err(CoreError::Config(format!(
                    "llm.provider must be \"openai\" or \"anthropic\", got \"{}\"",
                    other
                )));
            }
        }
        Ok(())
    }

    /// Path of the SQLite database inside the data directory
    pub fn db_path(&self) -> PathBuf {
        self.core.data_dir.join("lectern.db")
    }
}

/// Expand a leading ~ to the user's home directory
fn expand_tilde(path: &Path) -> Result<PathBuf, CoreError> {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Config("Could not determine home directory".to_string()))?;
        Ok(home.join(rest))
    } else {
        Ok(path.to_path_buf())
    }
}
