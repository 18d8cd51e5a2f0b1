use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::SpectreConfig;

pub const CONFIG_FILE_NAME: &str = "spectre.toml";

/// Finds `spectre.toml` in `start_dir` or its ancestors, then falls back to
/// `~/.config/spectre/config.toml`
pub fn discover_config(start_dir: &Path) -> Option<PathBuf> {
    let found = start_dir
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file());

    if found.is_some() {
        return found;
    }

    global_config_path().filter(|path| path.is_file())
}

pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config/spectre/config.toml"))
}

/// Loads configuration with auto-discovery support
///
/// An explicit path must exist. Without one, the nearest discovered file is
/// used, and defaults apply when nothing is found.
pub fn load_config_with_discovery(explicit_path: Option<&Path>) -> Result<SpectreConfig> {
    let path = match explicit_path {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let current_dir = std::env::current_dir()
                .context("Failed to get current directory for config discovery")?;
            discover_config(&current_dir)
        }
    };

    let config = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration");
            SpectreConfig::from_file(&path)?
        }
        None => {
            debug!("no configuration file found, using defaults");
            SpectreConfig::default()
        }
    };

    config.validate()?;
    Ok(config)
}
