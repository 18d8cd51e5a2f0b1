pub mod cache;
pub mod compile;
pub mod request;
pub mod validate;

use anyhow::{Context, Result};
use std::io::IsTerminal;
use spectre::config_discovery::load_config_with_discovery;
use spectre::{Client, SpectreConfig};

use crate::cli::CommonArgs;

/// Discovered configuration with command line overrides applied
pub fn load_config(common: &CommonArgs) -> Result<SpectreConfig> {
    let mut config = load_config_with_discovery(common.config.as_deref())?;

    if let Some(engine) = &common.engine {
        config.engine.path = engine.clone();
    }
    if let Some(dir) = &common.cache_dir {
        config.cache.dir = Some(dir.clone());
    }
    if !common.procedures.is_empty() {
        let mut dirs = common.procedures.clone();
        dirs.append(&mut config.procedures.dirs);
        config.procedures.dirs = dirs;
    }
    if common.debug {
        config.engine.debug = true;
    }
    if common.no_cache {
        config.compiler.cache = false;
    }

    config.validate()?;
    Ok(config)
}

/// `[spectre]` tag for status lines on stderr, colored on terminals
pub fn tag() -> &'static str {
    if std::io::stderr().is_terminal() {
        "\x1b[96m[spectre]\x1b[0m"
    } else {
        "[spectre]"
    }
}

pub fn client(common: &CommonArgs) -> Result<Client> {
    let config = load_config(common)?;
    Client::new(&config).context("Failed to set up client")
}
