//! Application configuration management.
//!
//! Configuration is stored at `~/.config/idgate/config.json` and holds the
//! OAuth2 client registration and API endpoints. Every field can be
//! overridden from the environment (`IDGATE_*`), which is how most MCP client
//! configurations pass settings in.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Application name used for config directory paths
const APP_NAME: &str = "idgate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_AUTH_BASE_URL: &str = "https://auth.pingone.com";
const DEFAULT_API_BASE_URL: &str = "https://api.pingone.com/v1";
const DEFAULT_SCOPES: &str = "openid";

/// Loopback port for the authorization-code redirect.
/// 7464 is unassigned and unlikely to collide with local dev servers.
const DEFAULT_REDIRECT_PORT: u16 = 7464;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client_id: Option<String>,
    pub auth_base_url: String,
    pub api_base_url: String,
    pub scopes: String,
    pub redirect_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: None,
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            scopes: DEFAULT_SCOPES.to_string(),
            redirect_port: DEFAULT_REDIRECT_PORT,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "Loading config file");
                let contents = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Configuration(format!("failed to read {}: {}", path.display(), e))
                })?;
                Self::from_json(&contents)?
            }
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| Error::Configuration(format!("invalid config file: {}", e)))
    }

    /// Apply `IDGATE_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(client_id) = lookup("IDGATE_CLIENT_ID") {
            self.client_id = Some(client_id);
        }
        if let Some(url) = lookup("IDGATE_AUTH_BASE_URL") {
            self.auth_base_url = url;
        }
        if let Some(url) = lookup("IDGATE_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(scopes) = lookup("IDGATE_SCOPES") {
            self.scopes = scopes;
        }
        if let Some(port) = lookup("IDGATE_REDIRECT_PORT") {
            self.redirect_port = port.parse().map_err(|_| {
                Error::Configuration(format!("IDGATE_REDIRECT_PORT is not a port number: {}", port))
            })?;
        }
        Ok(())
    }

    /// The OAuth2 client id, required before any login can start.
    pub fn require_client_id(&self) -> Result<&str> {
        self.client_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Error::Configuration(
                    "no OAuth2 client id configured (set IDGATE_CLIENT_ID or client_id in config.json)"
                        .to_string(),
                )
            })
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
