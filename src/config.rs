//! Settings management for unpkg
//!
//! Stores tool locations and the fallback extraction directory in
//! ~/.config/unpkg/settings.json (platform config dir on macOS).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::archive::ToolPaths;
use crate::destination::default_fallback_base;

/// User settings for unpkg
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Locations of xar, cpio, pax and gzcat
    #[serde(default)]
    pub tools: ToolPaths,

    /// Where to extract when a package's folder is not writable
    /// (None = desktop)
    #[serde(default)]
    pub fallback_dir: Option<PathBuf>,
}

impl Settings {
    /// Get the config directory path (~/.config/unpkg)
    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("unpkg");

        Ok(config_dir)
    }

    /// Get the settings file path
    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.json"))
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        match Self::settings_path().and_then(|path| Self::load_from(&path)) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Could not load settings: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Load settings from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;

        Ok(settings)
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::settings_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Directory used when a package's own folder is not writable
    pub fn resolve_fallback_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.fallback_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_fallback_base().ok_or(ConfigError::NoFallbackDir),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, path) in self.tools.entries() {
            if !path.is_file() {
                return Err(ConfigError::ToolNotFound {
                    name,
                    path: path.to_path_buf(),
                });
            }
        }

        if let Some(dir) = &self.fallback_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(ConfigError::FallbackNotDirectory(dir.clone()));
            }
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} not found at {path}")]
    ToolNotFound { name: &'static str, path: PathBuf },

    #[error("Fallback directory is not a directory: {0}")]
    FallbackNotDirectory(PathBuf),

    #[error("Could not determine a desktop directory; set fallback_dir")]
    NoFallbackDir,
}
