// Client configuration for connecting to an emulator

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::DEFAULT_PORT;

/// Connection and timing settings shared by every front end
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClientConfig {
    /// Emulator host name or IP address
    #[serde(default = "default_host")]
    pub host: String,

    /// Emulator port (default: 65400)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Name announced with MY_NAME_IS after connecting (empty = don't announce)
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// How long a connect attempt may take, in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// How long to wait for a single reply, in milliseconds
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    /// Status/game-info polling interval while connected, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_client_name() -> String {
    "emunwa".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_reply_timeout_ms() -> u64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_name: default_client_name(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reply_timeout_ms: default_reply_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("Host cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("Port must be greater than 0".to_string()));
        }
        if self.connect_timeout_ms == 0 || self.reply_timeout_ms == 0 {
            return Err(Error::Config("Timeouts must be greater than 0".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(
                "Poll interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from a TOML file, falling back to defaults when it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
}

/// Directory holding all emunwa configuration files
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
    Ok(config_dir.join("emunwa"))
}
