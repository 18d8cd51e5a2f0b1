/// Headless runtime executable
///
/// Holds the executable path, its command line options, and the diagnostic
/// output of the most recent run.
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

pub const DEFAULT_EXECUTABLE: &str = "phantomjs";
pub const DISK_CACHE_FLAG: &str = "--disk-cache=true";
pub const DEBUG_FLAG: &str = "--debug=true";

#[derive(Debug)]
pub struct Engine {
    path: PathBuf,
    options: Vec<String>,
    debug: bool,
    cache: bool,
    log: Mutex<String>,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_EXECUTABLE),
            options: Vec::new(),
            debug: false,
            cache: false,
            log: Mutex::new(String::new()),
        }
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine for the given executable, validating it right away
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut engine = Self::default();
        engine.set_path(path)?;
        Ok(engine)
    }

    /// Create an engine whose executable is only checked when it is run
    pub fn lazy<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the executable path
    ///
    /// Bare names are looked up in PATH. Fails with `InvalidExecutable` if
    /// the file does not exist or is not executable.
    pub fn set_path<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut Self> {
        self.path = validate_executable(path.as_ref())?;
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add a command line option, ignoring exact duplicates
    pub fn add_option<S: Into<String>>(&mut self, option: S) -> &mut Self {
        let option = option.into();
        if !self.options.contains(&option) {
            self.options.push(option);
        }
        self
    }

    /// Replace all command line options
    pub fn set_options<I, S>(&mut self, options: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.clear();
        for option in options {
            self.add_option(option);
        }
        self
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Toggle the runtime's debug output (`--debug=true`)
    pub fn debug(&mut self, enabled: bool) -> &mut Self {
        self.debug = enabled;
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Toggle the runtime's disk cache (`--disk-cache=true`)
    pub fn cache(&mut self, enabled: bool) -> &mut Self {
        self.cache = enabled;
        self
    }

    pub fn is_cache(&self) -> bool {
        self.cache
    }

    /// Program and arguments to spawn, without the script path
    pub fn invocation(&self) -> Result<(PathBuf, Vec<String>)> {
        let path = validate_executable(&self.path)?;

        let mut args = self.options.clone();
        if self.cache {
            args.push(DISK_CACHE_FLAG.to_string());
        }
        if self.debug {
            args.push(DEBUG_FLAG.to_string());
        }

        Ok((path, args))
    }

    /// Full command line as a single string
    pub fn command(&self) -> Result<String> {
        let (path, args) = self.invocation()?;
        if args.is_empty() {
            return Ok(path.display().to_string());
        }
        Ok(format!("{} {}", path.display(), args.join(" ")))
    }

    /// Replace the stored diagnostic log
    pub fn log<S: Into<String>>(&self, text: S) {
        *self.log.lock().unwrap_or_else(PoisonError::into_inner) = text.into();
    }

    pub fn get_log(&self) -> String {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_log(&self) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn validate_executable(path: &Path) -> Result<PathBuf> {
    let is_bare_name = !path.is_absolute() && path.components().count() == 1;

    let resolved = if is_bare_name && !path.exists() {
        which::which(path).map_err(|e| Error::InvalidExecutable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
    } else {
        path.to_path_buf()
    };

    if !resolved.is_file() {
        return Err(Error::InvalidExecutable {
            path: resolved,
            reason: "file does not exist".to_string(),
        });
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mode = resolved
            .metadata()
            .map_err(|e| Error::InvalidExecutable {
                path: resolved.clone(),
                reason: e.to_string(),
            })?
            .permissions()
            .mode();
        if mode & 0o111 == 0 {
            return Err(Error::InvalidExecutable {
                path: resolved,
                reason: "file is not executable".to_string(),
            });
        }
    }

    debug!(path = %resolved.display(), "engine executable validated");
    Ok(resolved)
}
