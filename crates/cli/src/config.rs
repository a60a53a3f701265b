//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8000";

/// CLI configuration, read from `~/.config/gwctl/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Gateway endpoint URL
    pub gateway_url: Option<String>,
    /// Default namespace
    pub default_namespace: Option<String>,
    /// Default output format
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Command line and environment win over the file
    pub fn gateway_url(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.gateway_url.clone())
            .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string())
    }

    pub fn namespace(&self, flag: Option<String>) -> Option<String> {
        flag.or_else(|| self.default_namespace.clone())
    }

    pub fn format(&self, flag: Option<crate::output::OutputFormat>) -> Result<crate::output::OutputFormat> {
        match (flag, &self.default_format) {
            (Some(format), _) => Ok(format),
            (None, Some(name)) => name
                .parse()
                .map_err(|err| anyhow::anyhow!("Invalid default_format in config: {err}")),
            (None, None) => Ok(Default::default()),
        }
    }

    /// Get the configuration file path
    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("gwctl").join("config.json"))
    }
}
