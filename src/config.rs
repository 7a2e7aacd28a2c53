use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Engine configuration, stored as JSON under the platform config dir
/// (`~/.config/chatline/config.json` on Linux).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the conversation service, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request when set.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

impl EngineConfig {
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("chatline")
            .join("config.json"))
    }

    /// Load from the default path; a missing file yields the defaults.
    pub async fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?).await
    }

    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?).await
    }

    /// Write atomically (temp file, then rename).
    pub async fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }
}
