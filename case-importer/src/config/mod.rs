//! Application configuration
//!
//! Settings come from, in increasing precedence: built-in defaults, a TOML
//! file, the environment (including `.env`), and command-line flags.

pub mod layout;
pub mod repository;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use layout::{CellRef, ColumnRange, FieldColumns, RecordDefaults, SheetLayout};

/// Environment variable overriding the database location
pub const DATABASE_URL_ENV: &str = "CASE_IMPORTER_DATABASE_URL";

const APP_DIR: &str = "case-importer";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// sqlx connection URL; defaults to a SQLite file in the data directory
    pub database_url: Option<String>,
    pub layout: SheetLayout,
    pub defaults: RecordDefaults,
}

impl Config {
    /// Load from an explicit file, or from the default location when it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Config::default(),
        };

        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            config.apply_database_override(Some(url));
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Replace the database URL when an override is present and non-empty
    pub fn apply_database_override(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.database_url = Some(url);
        }
    }

    /// Effective database URL
    pub fn database_url(&self) -> Result<String> {
        match &self.database_url {
            Some(url) => Ok(url.clone()),
            None => {
                let path = default_database_path()?;
                Ok(format!("sqlite://{}", path.display()))
            }
        }
    }
}

/// `<config dir>/case-importer/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// `<data dir>/case-importer/cases.db`
pub fn default_database_path() -> Result<PathBuf> {
    let dir = dirs::data_dir().context("Could not determine the user data directory")?;
    Ok(dir.join(APP_DIR).join("cases.db"))
}
