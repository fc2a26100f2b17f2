//! Configuration for RankMate
//!
//! Config lives in `~/.rankmate/config.json`; every field has a serde
//! default so a partial (or missing) file yields a working configuration.
//! Secrets (the provider API key) come from the environment, not the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Agent loop defaults
    #[serde(default)]
    pub agent: AgentDefaults,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Defaults governing the agent loop and session layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    /// Default model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum LLM calls per user turn; the loop force-terminates past this
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Centrally enforced per-tool-call timeout
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// Session inactivity TTL
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_iterations() -> u32 {
    5
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_session_ttl_secs() -> u64 {
    3600
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_iterations: default_max_iterations(),
            tool_timeout_secs: default_tool_timeout_secs(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Default tracing pretty-print
    Pretty,
    /// Compact single-line text, grep-friendly
    Compact,
    /// Structured JSON lines for log aggregators
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Optional log file path (JSON format only); stderr otherwise
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            file: None,
            level: default_log_level(),
        }
    }
}

impl Config {
    /// The RankMate config directory (`~/.rankmate`).
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".rankmate")
    }

    /// Path of the config file.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load the config from the default location; a missing file yields the
    /// defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    /// Load the config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the config to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
