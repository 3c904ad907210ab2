//! Command-line configuration management.
//!
//! Holds the last used username, the client identifier sent with every
//! submission, an optional log directory, and optional endpoint overrides.
//!
//! Configuration is stored at `~/.config/hatchet/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hatchet_core::ServiceConfig;
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths
const APP_NAME: &str = "hatchet";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Sent as the User-Agent when nothing else is configured
pub const DEFAULT_CLIENT_ID: &str = concat!("hatchet-cli/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub username: Option<String>,
    pub client_id: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub auth_base_url: Option<String>,
    pub api_base_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn client_id(&self) -> &str {
        self.client_id.as_deref().unwrap_or(DEFAULT_CLIENT_ID)
    }

    /// Service endpoints, production unless overridden
    pub fn service(&self) -> ServiceConfig {
        let mut service = ServiceConfig::default();
        if let Some(ref url) = self.auth_base_url {
            service.auth_base_url = url.clone();
        }
        if let Some(ref url) = self.api_base_url {
            service.api_base_url = url.clone();
        }
        service
    }
}
