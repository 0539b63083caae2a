//! Per-user configuration: `$HOME/.ghizmo.yml`.
//!
//! ```yaml
//! username: octocat
//! access_token: ghp_...
//! api_url: https://ghe.example.com/api/v3   # optional
//! ```
//!
//! Read once at startup and handed to the run context; never written.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::github::client::DEFAULT_API_URL;

pub const CONFIG_FILENAME: &str = ".ghizmo.yml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub username: Option<String>,
    pub access_token: Option<String>,
    pub api_url: Option<String>,
}

impl Config {
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_FILENAME))
    }

    /// Load from the default location; a missing file yields the defaults.
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Token from the file, falling back to `GITHUB_TOKEN`.
    pub fn token(&self, env_token: Option<String>) -> Option<String> {
        self.access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| env_token.filter(|t| !t.trim().is_empty()))
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }
}
