// emunwa mock server - Config Module
// Listener address and the core loaded at startup

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::emulator::default_cores;

/// Mock server configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Address to listen on (e.g. "127.0.0.1:65400" or "[::1]:65400")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Core loaded when the server starts; empty starts with no core
    #[serde(default = "default_initial_core")]
    pub initial_core: String,
}

fn default_bind_address() -> String {
    emunwa_common::format_host_port("127.0.0.1", emunwa_common::DEFAULT_PORT)
}

fn default_initial_core() -> String {
    "snes9x".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            initial_core: default_initial_core(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        let (host, port) = self
            .bind_address
            .rsplit_once(':')
            .with_context(|| format!("Bind address '{}' has no port", self.bind_address))?;
        if host.is_empty() {
            anyhow::bail!("Bind address '{}' has no host", self.bind_address);
        }
        port.parse::<u16>()
            .with_context(|| format!("Invalid port in bind address '{}'", self.bind_address))?;

        if !self.initial_core.is_empty()
            && !default_cores().iter().any(|c| c.name == self.initial_core)
        {
            anyhow::bail!("Unknown initial core '{}'", self.initial_core);
        }
        Ok(())
    }

    /// Load from `path`, or from the default location when none is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            info!("No mock server configuration found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)
            .context("Failed to read mock server configuration")?;
        let config: Self =
            toml::from_str(&contents).context("Failed to parse mock server configuration")?;
        config
            .validate()
            .context("Configuration validation failed")?;

        info!("Loaded mock server configuration from: {}", config_path.display());
        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(emunwa_common::config_dir()?.join("mock.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1:65400");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bind_address() {
        let config = ServerConfig {
            bind_address: "[::1]:65400".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = ServerConfig {
            bind_address: "localhost".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            bind_address: "127.0.0.1:99999".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_initial_core() {
        let config = ServerConfig {
            initial_core: "mesen".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            initial_core: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mock.toml");
        fs::write(&path, "initial_core = \"gambatte\"\n").unwrap();

        let config = ServerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.initial_core, "gambatte");
        assert_eq!(config.bind_address, "127.0.0.1:65400");

        let missing = ServerConfig::load(Some(&dir.path().join("none.toml"))).unwrap();
        assert_eq!(missing, ServerConfig::default());
    }
}
