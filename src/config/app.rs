// src/config/app.rs
use std::env;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::{debug, warn};

use super::defaults::*;
use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub keys: Keys,
    #[serde(default)]
    pub features: Features,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paths {
    /// Directory holding every blob + sidecar, one sub-directory per document
    pub storage_root: PathBuf,
    pub backup_dir: PathBuf,
    pub index_db: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Keys {
    /// Content key as 64 hex chars or base64 (dev only: prefer `EDV_MASTER_KEY`)
    pub master_key: Option<String>,
    pub index_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Features {
    pub use_dev_keys: bool,
}

impl Default for Paths {
    fn default() -> Self {
        default_paths()
    }
}

impl Default for Keys {
    fn default() -> Self {
        default_keys()
    }
}

impl Default for Features {
    fn default() -> Self {
        default_features()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            paths: default_paths(),
            keys: default_keys(),
            features: default_features(),
        }
    }
}

impl Config {
    /// Parse a TOML config file; missing sections fall back to defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Config> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `EDV_*` overrides through an arbitrary lookup (env in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("EDV_STORAGE_ROOT") {
            self.paths.storage_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("EDV_BACKUP_DIR") {
            self.paths.backup_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("EDV_INDEX_DB") {
            self.paths.index_db = PathBuf::from(v);
        }
        if let Some(v) = lookup("EDV_INDEX_KEY") {
            self.keys.index_key = v;
        }
        // A real key in the environment always wins over dev keys
        if lookup("EDV_MASTER_KEY").is_some() || lookup("EDV_TEST_MODE").is_some() {
            self.features.use_dev_keys = false;
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }
}

static CONFIG: OnceCell<Config> = OnceCell::new();

/// Load config once per process: falls back to defaults if the file is missing
pub fn load() -> Result<&'static Config> {
    CONFIG.get_or_try_init(|| {
        let config_path =
            env::var("EDV_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut conf = if Path::new(&config_path).exists() {
            debug!(path = %config_path, "loading config");
            Config::from_file(&config_path)?
        } else {
            warn!(path = %config_path, "config file not found, using built-in defaults");
            Config::default()
        };

        conf.apply_env_overrides();
        Ok(conf)
    })
}
