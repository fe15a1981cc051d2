//! Config file discovery.
//!
//! Resolution order (first hit wins):
//! 1. explicit path passed by the caller
//! 2. `SESSIONFARM_CONFIG` environment variable
//! 3. `./sessionfarm.toml`
//!
//! When nothing is found the defaults are used.

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, StoreConfig};

/// Default config filename in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "sessionfarm.toml";

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "SESSIONFARM_CONFIG";

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The loaded configuration.
    pub config: StoreConfig,
    /// File the config was read from, `None` when defaults were used.
    pub source: Option<PathBuf>,
}

/// Load configuration, discovering the file if no path is given.
///
/// An explicitly requested file must exist; a discovered one is optional.
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = path {
        return Ok(LoadedConfig {
            config: load_config_file(path)?,
            source: Some(path.to_path_buf()),
        });
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV)
        && !env_path.is_empty()
    {
        let path = PathBuf::from(env_path);
        return Ok(LoadedConfig {
            config: load_config_file(&path)?,
            source: Some(path),
        });
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        return Ok(LoadedConfig {
            config: load_config_file(&local)?,
            source: Some(local),
        });
    }

    Ok(LoadedConfig {
        config: StoreConfig::default(),
        source: None,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<StoreConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    StoreConfig::from_toml(&contents)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
