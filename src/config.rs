use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::default_cache_dir;
use crate::engine::DEFAULT_EXECUTABLE;
use crate::procedure::DEFAULT_TERMINATION_PATTERN;

/// Complete Spectre configuration (loaded from TOML file)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpectreConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub procedures: ProceduresConfig,

    #[serde(default)]
    pub compiler: CompilerConfig,

    #[serde(default)]
    pub validator: ValidatorConfig,
}

/// Headless browser runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executable name (looked up on PATH) or path
    #[serde(default = "default_engine_path")]
    pub path: String,

    /// Extra command line options, passed before the script path
    #[serde(default)]
    pub options: Vec<String>,

    /// Run the runtime with `--debug=true`
    #[serde(default)]
    pub debug: bool,

    /// Run the runtime with `--disk-cache=true`
    #[serde(default)]
    pub disk_cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: default_engine_path(),
            options: Vec::new(),
            debug: false,
            disk_cache: false,
        }
    }
}

/// Script cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache directory (defaults to the user cache dir)
    #[serde(default)]
    pub dir: Option<String>,

    /// Extension given to cached scripts
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            extension: default_extension(),
        }
    }
}

impl CacheConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir)
    }
}

/// Template search path
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProceduresConfig {
    /// Directories searched before the built-in templates, first match wins
    #[serde(default)]
    pub dirs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Reuse compiled skeletons across runs
    #[serde(default = "default_true")]
    pub cache: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self { cache: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Replacement syntax checker script
    #[serde(default)]
    pub checker: Option<String>,

    /// Pattern every generated script must match
    #[serde(default = "default_termination")]
    pub termination_pattern: String,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            checker: None,
            termination_pattern: default_termination(),
        }
    }
}

fn default_engine_path() -> String {
    DEFAULT_EXECUTABLE.to_string()
}

fn default_extension() -> String {
    "js".to_string()
}

fn default_termination() -> String {
    DEFAULT_TERMINATION_PATTERN.to_string()
}

fn default_true() -> bool {
    true
}

impl SpectreConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: SpectreConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Generate example configuration as TOML string
    pub fn example() -> Result<String> {
        let config = SpectreConfig {
            engine: EngineConfig {
                options: vec!["--ignore-ssl-errors=true".to_string()],
                ..Default::default()
            },
            cache: CacheConfig {
                dir: Some(".spectre/cache".to_string()),
                ..Default::default()
            },
            procedures: ProceduresConfig {
                dirs: vec!["procedures".to_string()],
            },
            ..Default::default()
        };

        toml::to_string_pretty(&config).context("Failed to serialize example config")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.path.is_empty() {
            anyhow::bail!("engine.path must be set");
        }

        if self.cache.extension.is_empty() || self.cache.extension.contains(['/', '\\', '.']) {
            anyhow::bail!(
                "cache.extension must be a bare extension without dots or separators: {:?}",
                self.cache.extension
            );
        }

        if let Some(dir) = &self.cache.dir {
            if dir.is_empty() {
                anyhow::bail!("cache.dir must not be empty when set");
            }
        }

        for dir in &self.procedures.dirs {
            if dir.is_empty() {
                anyhow::bail!("procedures.dirs must not contain empty entries");
            }
        }

        Regex::new(&self.validator.termination_pattern).with_context(|| {
            format!(
                "validator.termination_pattern is not a valid regex: {}",
                self.validator.termination_pattern
            )
        })?;

        Ok(())
    }
}
