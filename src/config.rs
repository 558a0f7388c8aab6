use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

use crate::paths;

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Default destination directory for downloads
pub const DEFAULT_DESTINATION: &str = "/backup";

/// Default ranged-fetch part size (100 MB, decimal)
pub const DEFAULT_PART_SIZE: u64 = 100 * 1000 * 1000;

/// Default free-space threshold in percent
pub const DEFAULT_MIN_FREE_PERCENT: f64 = 5.0;

/// drivesweep configuration (`config.toml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Remote folder to drain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    /// Local directory downloads are written to
    pub destination: String,
    /// Maximum bytes per ranged fetch
    pub part_size: u64,
    /// Halt when free space is at or below this percentage
    pub min_free_percent: f64,
    /// OAuth client secrets file (defaults to `<config dir>/auth.json`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secrets: Option<String>,
    /// Token cache (defaults to `<state dir>/token.json`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<String>,
    /// OAuth scopes requested during authorization
    pub scopes: Vec<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            folder_id: None,
            destination: DEFAULT_DESTINATION.to_string(),
            part_size: DEFAULT_PART_SIZE,
            min_free_percent: DEFAULT_MIN_FREE_PERCENT,
            client_secrets: None,
            token_file: None,
            scopes: vec![gdrive::auth::DRIVE_SCOPE.to_string()],
        }
    }
}

impl SweepConfig {
    /// Default config file path
    pub fn path() -> Result<PathBuf> {
        Ok(paths::config_dir()?.join(CONFIG_FILE))
    }

    /// Load the config from its default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load a config file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config format in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config file, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Could not write {}", path.display()))?;
        Ok(())
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.part_size == 0 {
            anyhow::bail!("part_size must be greater than 0");
        }
        if !(0.0..100.0).contains(&self.min_free_percent) {
            anyhow::bail!(
                "min_free_percent must be in [0, 100), got {}",
                self.min_free_percent
            );
        }
        if self.destination.trim().is_empty() {
            anyhow::bail!("destination must not be empty");
        }
        Ok(())
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, folder_id: Option<String>, destination: Option<String>) -> Self {
        if folder_id.is_some() {
            self.folder_id = folder_id;
        }
        if let Some(destination) = destination {
            self.destination = destination;
        }
        self
    }

    /// Folder id, or an error explaining how to set it
    pub fn require_folder(&self) -> Result<&str> {
        self.folder_id.as_deref().context(
            "No folder configured. Pass --folder, set DRIVESWEEP_FOLDER_ID, or run 'drivesweep config init --folder <ID>'",
        )
    }

    /// Part size as a non-zero value
    pub fn part_size(&self) -> Result<NonZeroU64> {
        NonZeroU64::new(self.part_size).context("part_size must be greater than 0")
    }

    /// Expanded destination directory
    pub fn destination_path(&self) -> PathBuf {
        paths::expand(&self.destination)
    }

    /// Client secrets path
    pub fn client_secrets_path(&self) -> Result<PathBuf> {
        match &self.client_secrets {
            Some(path) => Ok(paths::expand(path)),
            None => Ok(paths::config_dir()?.join("auth.json")),
        }
    }

    /// Token file path
    pub fn token_path(&self) -> Result<PathBuf> {
        match &self.token_file {
            Some(path) => Ok(paths::expand(path)),
            None => Ok(paths::state_dir()?.join("token.json")),
        }
    }
}
