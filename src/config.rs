//! Configuration file handling.
//!
//! Settings live in `config.toml` inside the platform configuration
//! directory. Every field is optional; a missing file means defaults.

use crate::listing::DEFAULT_DOMAIN;
use crate::quality::Quality;
use crate::session::{Credentials, SessionState};
use crate::sink::DEFAULT_FILENAME_FORMAT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_FILE: &str = "config.toml";

/// Application name used for the platform config and data directories.
pub(crate) const APP_NAME: &str = "lostfilm-monitor";

/// Platform directories for this application.
///
/// Linux: `~/.config/lostfilm-monitor`, `~/.local/share/lostfilm-monitor`.
pub(crate) fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to determine configuration directory location")]
    ConfigDirectoryNotFound,

    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Site account settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Site mirror, e.g. `www.lostfilmtv.site`
    pub domain: String,
    /// Quality for newly added shows
    pub default_quality: Quality,
    /// Where downloaded artifacts are written
    pub output_dir: PathBuf,
    /// File name template, see [`crate::format_filename`]
    pub filename_format: String,
    pub account: AccountConfig,
    /// Extra request headers, e.g. `User-Agent`
    pub headers: BTreeMap<String, String>,
    /// Extra cookies, e.g. `cf_clearance`
    pub cookies: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            default_quality: Quality::SD,
            output_dir: PathBuf::from("."),
            filename_format: DEFAULT_FILENAME_FORMAT.to_string(),
            account: AccountConfig::default(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Path of the config file in the platform configuration directory.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let proj_dirs = project_dirs().ok_or(ConfigError::ConfigDirectoryNotFound)?;
        Ok(proj_dirs.config_dir().join(CONFIG_FILE))
    }

    /// Loads the config file, falling back to defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    #[must_use]
    pub fn with_default_quality(mut self, quality: Quality) -> Self {
        self.default_quality = quality;
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::new(self.account.username.clone(), self.account.password.clone())
    }

    /// Session settings to apply on top of any stored session.
    pub fn session_settings(&self) -> SessionState {
        SessionState {
            session_token: None,
            cookies: self.cookies.clone(),
            headers: self.headers.clone(),
            domain: self.domain.clone(),
        }
    }
}
