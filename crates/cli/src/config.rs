// emunwa - CLI Config Module
// Connection settings read from cli.toml

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use emunwa_common::ClientConfig;

/// CLI configuration (wrapper around ClientConfig with file I/O)
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CliConfig {
    #[serde(flatten)]
    pub client: ClientConfig,
}

impl CliConfig {
    /// Load CLI configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).context("Failed to read CLI configuration")?;
        let config: Self = toml::from_str(&contents).context("Failed to parse CLI configuration")?;
        config
            .client
            .validate()
            .context("Invalid CLI configuration")?;

        Ok(config)
    }

    /// Get the path to the CLI configuration file
    pub fn config_path() -> Result<PathBuf> {
        Ok(emunwa_common::config_dir()?.join("cli.toml"))
    }

    /// Apply `--host` / `--port` overrides
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Result<ClientConfig> {
        if let Some(host) = host {
            self.client.host = host;
        }
        if let Some(port) = port {
            self.client.port = port;
        }
        self.client.validate()?;
        Ok(self.client)
    }
}
