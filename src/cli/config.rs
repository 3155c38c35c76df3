// CLI Configuration - File settings merged with command line overrides
// Principle: one validated config reaches the runner, never raw arguments

use crate::audit::{AuditSettings, MinimumFees, DEFAULT_STAKE_HANDLER_ID};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration file picked up from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "stake-auditor.toml";

/// Complete auditor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditorConfig {
    /// Node JSON-RPC endpoint
    pub rpc_url: String,

    /// Term length in seconds, as configured on chain
    pub term_seconds: u64,

    /// Custom action handler id of the stake module
    pub stake_handler_id: u64,

    /// Cold-start height when no checkpoint exists (chain tip if unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_height: Option<u64>,

    /// Delay between tip polls once caught up
    pub poll_interval_ms: u64,

    /// Per-request RPC timeout
    pub request_timeout_secs: u64,

    /// Retries of a height after a transient RPC failure
    pub max_retries: u32,

    /// First retry delay, doubled on each attempt
    pub retry_backoff_ms: u64,

    /// Checkpoint database location
    pub data_dir: PathBuf,

    /// Receives discrepancies as JSON when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Minimum fee per transaction kind
    pub minimum_fees: MinimumFees,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8080".to_string(),
            term_seconds: 3_600,
            stake_handler_id: DEFAULT_STAKE_HANDLER_ID,
            start_height: None,
            poll_interval_ms: 1_000,
            request_timeout_secs: 30,
            max_retries: 5,
            retry_backoff_ms: 500,
            data_dir: default_data_dir(),
            webhook_url: None,
            minimum_fees: MinimumFees::default(),
        }
    }
}

/// `<data dir>/stake-auditor`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stake-auditor")
}

impl AuditorConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Explicit file if given, else `stake-auditor.toml` if present, else defaults
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Write(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Write(e.to_string()))
    }

    // Builder-style methods for CLI overrides

    pub fn with_rpc_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.rpc_url = url;
        }
        self
    }

    pub fn with_start_height(mut self, height: Option<u64>) -> Self {
        if height.is_some() {
            self.start_height = height;
        }
        self
    }

    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.data_dir = dir;
        }
        self
    }

    pub fn with_webhook_url(mut self, url: Option<String>) -> Self {
        if url.is_some() {
            self.webhook_url = url;
        }
        self
    }

    pub fn with_term_seconds(mut self, seconds: Option<u64>) -> Self {
        if let Some(seconds) = seconds {
            self.term_seconds = seconds;
        }
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.term_seconds == 0 {
            return Err(ConfigError::Invalid("term_seconds must be positive".into()));
        }

        if !is_http_url(&self.rpc_url) {
            return Err(ConfigError::Invalid(format!(
                "rpc_url ({}) must be an http(s) URL",
                self.rpc_url
            )));
        }

        if let Some(url) = &self.webhook_url {
            if !is_http_url(url) {
                return Err(ConfigError::Invalid(format!(
                    "webhook_url ({}) must be an http(s) URL",
                    url
                )));
            }
        }

        if self.poll_interval_ms == 0 || self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms and request_timeout_secs must be positive".into(),
            ));
        }

        if self.max_retries > 0 && self.retry_backoff_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry_backoff_ms must be positive when retries are enabled".into(),
            ));
        }

        Ok(())
    }

    pub fn audit_settings(&self) -> AuditSettings {
        AuditSettings {
            term_seconds: self.term_seconds,
            stake_handler_id: self.stake_handler_id,
            minimum_fees: self.minimum_fees.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to write config: {0}")]
    Write(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
