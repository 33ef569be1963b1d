//! Home-based storage paths for compass-usage.
//!
//! Everything lives under `~/.compass-usage/` unless `COMPASS_USAGE_HOME`
//! points elsewhere:
//! - `config.yaml` - Optional server configuration
//! - `cache/` - Settled months of usage exports
//! - `logs/server.log` - Service log

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// The name of the compass-usage directory inside the home directory.
const HOME_DIR_NAME: &str = ".compass-usage";

/// Environment variable overriding the home-based directory.
pub const HOME_ENV: &str = "COMPASS_USAGE_HOME";

/// Returns the compass-usage directory: `~/.compass-usage/`
///
/// Creates the directory if it doesn't exist.
///
/// # Errors
///
/// Returns an error if:
/// - Home directory cannot be determined
/// - Directory creation fails
pub fn compass_home_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os(HOME_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .context("Could not determine home directory for compass-usage storage")?
            .join(HOME_DIR_NAME),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create compass-usage directory: {}", dir.display()))?;
    Ok(dir)
}

/// Returns the default cache directory: `~/.compass-usage/cache/`
///
/// Creates the directory if it doesn't exist.
pub fn default_cache_dir() -> Result<PathBuf> {
    let dir = compass_home_dir()?.join("cache");
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;
    Ok(dir)
}

/// Returns the service log path: `~/.compass-usage/logs/server.log`
pub fn server_log_path() -> Result<PathBuf> {
    let logs = compass_home_dir()?.join("logs");
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs.join("server.log"))
}

/// Returns the default config path: `~/.compass-usage/config.yaml`
///
/// The file itself is optional and not created.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(compass_home_dir()?.join("config.yaml"))
}
