//! Configuration file resolution and loading
//!
//! Services resolve their TOML config file with ENV > explicit path > platform
//! default priority, then overlay individual environment variables on top.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::PathBuf;

/// Resolve the config file path for a service.
///
/// Priority order:
/// 1. `SONIC_{MODULE}_CONFIG` environment variable (path)
/// 2. `~/.config/soniclayer/{module}.toml`
/// 3. `/etc/soniclayer/{module}.toml` (Linux only)
///
/// Returns `None` when no config file exists; callers fall back to defaults.
pub fn resolve_config_path(module: &str) -> Option<PathBuf> {
    let env_var = format!("SONIC_{}_CONFIG", module.to_uppercase().replace('-', "_"));
    if let Ok(path) = std::env::var(&env_var) {
        tracing::debug!(module, path = %path, "Config path from environment");
        return Some(PathBuf::from(path));
    }

    if let Some(user_config) = dirs::config_dir()
        .map(|d| d.join("soniclayer").join(format!("{}.toml", module)))
    {
        if user_config.exists() {
            return Some(user_config);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from(format!("/etc/soniclayer/{}.toml", module));
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load and parse a TOML config file into the service's config type
pub fn load_toml<T: DeserializeOwned>(path: &PathBuf) -> Result<T> {
    tracing::info!(path = %path.display(), "Loading config file");
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// OS-dependent default data folder (holds the service database)
pub fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("soniclayer"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/soniclayer"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("soniclayer"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/soniclayer"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("soniclayer"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\soniclayer"))
    } else {
        PathBuf::from("./soniclayer_data")
    }
}
