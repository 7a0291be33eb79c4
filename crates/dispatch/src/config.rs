//! Dispatch configuration loaded from TOML.

use std::path::Path;

use proto::ConfigError;
use serde::{Deserialize, Serialize};

/// Provider name used when no `local_model_provider` is configured.
pub const DEFAULT_LOCAL_PROVIDER: &str = "local";

/// Review message used when the policy gate blocks without one.
pub const DEFAULT_REVIEW_MESSAGE: &str =
    "This request needs human review before it can proceed.";

/// Tunables for the dispatch core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Designated provider name sovereign-mode agents are pinned to.
    pub local_model_provider: String,
    /// Fallback human message for policy blocks without a reason.
    pub default_review_message: String,
    /// Bounded buffer size for stream session channels.
    pub stream_buffer: usize,
    /// Number of trailing transcript lines summarized for the policy gate.
    pub policy_history_lines: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            local_model_provider: DEFAULT_LOCAL_PROVIDER.to_string(),
            default_review_message: DEFAULT_REVIEW_MESSAGE.to_string(),
            stream_buffer: 64,
            policy_history_lines: 5,
        }
    }
}

impl DispatchConfig {
    /// Parses configuration from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::Toml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.local_model_provider.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "local_model_provider".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.stream_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                field: "stream_buffer".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
