//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the API
//! base URL, an optional request timeout, quarantined user ids, and which
//! storage backend holds the session.
//!
//! Configuration is stored at `~/.config/poscontrol/config.json` and can be
//! overridden from the environment (`POSCONTROL_*`, see `apply_env`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileStorage, KeyringStorage, MemoryStorage, StoragePort};

/// Application name used for config/data directory paths
const APP_NAME: &str = "poscontrol";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend used when nothing is configured
const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";

pub const ENV_API_BASE_URL: &str = "POSCONTROL_API_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "POSCONTROL_TIMEOUT_SECS";
pub const ENV_QUARANTINED_USER_IDS: &str = "POSCONTROL_QUARANTINED_USER_IDS";
pub const ENV_STORAGE: &str = "POSCONTROL_STORAGE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" | "keychain" => Ok(StorageBackend::Keyring),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// `None` leaves the HTTP client's default in place
    pub request_timeout_secs: Option<u64>,
    /// User ids the backend is known to return in a broken state; dropped
    /// from user listings. Empty by default, so listings are only filtered
    /// once `POSCONTROL_QUARANTINED_USER_IDS` or the config file names ids.
    pub quarantined_user_ids: Vec<String>,
    pub storage: StorageBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: None,
            quarantined_user_ids: Vec::new(),
            storage: StorageBackend::default(),
        }
    }
}

impl Config {
    /// Load the config file (if any), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
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

    /// Apply overrides from `lookup`, normally the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS).filter(|v| !v.trim().is_empty()) {
            let secs = secs
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{} must be a whole number of seconds", ENV_TIMEOUT_SECS))?;
            self.request_timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(ids) = lookup(ENV_QUARANTINED_USER_IDS) {
            self.quarantined_user_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(storage) = lookup(ENV_STORAGE).filter(|v| !v.trim().is_empty()) {
            self.storage = storage.parse()?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for file-backed session storage.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Build the configured storage port.
    pub fn open_storage(&self) -> Result<Arc<dyn StoragePort>> {
        Ok(match self.storage {
            StorageBackend::File => Arc::new(FileStorage::new(self.data_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStorage::new()),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        })
    }
}
