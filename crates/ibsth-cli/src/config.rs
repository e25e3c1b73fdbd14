//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ibsth_core::SessionOptions;
use ibsth_core::store::default_cache_dir;
use serde::{Deserialize, Serialize};

use crate::cli::OutputFormat;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the address cache
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Connect timeout for address resolution, in seconds
    #[serde(default)]
    pub connect_timeout: Option<u64>,

    /// Report every advertisement rather than the first per sensor
    #[serde(default)]
    pub allow_duplicates: Option<bool>,

    /// Default output format
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ibsth")
            .join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from file, or return default if missing or unreadable
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config {}: {}", path.display(), e);
                }
            }
        }
        Self::default()
    }

    /// Cache directory: command line, then config, then the platform default.
    pub fn resolve_cache_dir(&self, arg: Option<PathBuf>) -> PathBuf {
        arg.or_else(|| self.cache_dir.clone())
            .unwrap_or_else(default_cache_dir)
    }

    /// Output format: command line, then config, then text.
    pub fn resolve_format(&self, arg: Option<OutputFormat>) -> OutputFormat {
        arg.or(self.format).unwrap_or_default()
    }

    /// Session options with command-line overrides applied over config values.
    pub fn session_options(&self, timeout: Option<u64>, no_duplicates: bool) -> SessionOptions {
        let mut options = SessionOptions::new();
        if let Some(secs) = timeout.or(self.connect_timeout) {
            options = options.connect_timeout(Duration::from_secs(secs));
        }
        let allow_duplicates = !no_duplicates && self.allow_duplicates.unwrap_or(true);
        options.allow_duplicates(allow_duplicates)
    }
}
