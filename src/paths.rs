//! Centralized path resolution for essh
//!
//! # Environment Variables
//!
//! - `ESSH_GLOBAL_DIR` - Override the global data directory
//! - `ESSH_CONFIG` - Override the local config file
//!
//! # Path Resolution Priority
//!
//! For global_dir():
//! 1. `ESSH_GLOBAL_DIR` environment variable
//! 2. `~/.essh`
//!
//! For local_config():
//! 1. `--config` flag
//! 2. `ESSH_CONFIG` environment variable
//! 3. `./esshconfig.toml`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for global data directory override
pub const ENV_GLOBAL_DIR: &str = "ESSH_GLOBAL_DIR";

/// Environment variable for local config file override
pub const ENV_CONFIG: &str = "ESSH_CONFIG";

/// Config file read from the global data directory
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Default local config file name
pub const LOCAL_CONFIG_FILE: &str = "esshconfig.toml";

/// Data directory created next to the local config file
pub const LOCAL_DATA_DIR: &str = ".essh";

/// Get the global data directory
pub fn global_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_GLOBAL_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using global dir from {}: {}",
            ENV_GLOBAL_DIR,
            path.display()
        );
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".essh"))
}

/// Get the global config file path
pub fn global_config() -> Result<PathBuf> {
    Ok(global_dir()?.join(GLOBAL_CONFIG_FILE))
}

/// Get the local config file path
pub fn local_config(flag: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }

    if let Ok(file) = std::env::var(ENV_CONFIG) {
        let path = expand(&file);
        log::debug!("Using config from {}: {}", ENV_CONFIG, path.display());
        return path;
    }

    PathBuf::from(LOCAL_CONFIG_FILE)
}

/// Data directory belonging to a local config file
pub fn local_dir(config: &Path) -> PathBuf {
    match config.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(LOCAL_DATA_DIR),
        _ => PathBuf::from(LOCAL_DATA_DIR),
    }
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
