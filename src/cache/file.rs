use super::Cache;
use crate::error::{Error, Result};
use glob::{glob, Pattern};
use rand::distr::Alphanumeric;
use rand::Rng;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const RANDOM_ID_LEN: usize = 20;

/// Generate a random alphanumeric id for single-use cache entries
pub fn random_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_ID_LEN)
        .map(char::from)
        .collect()
}

/// Flat file cache
///
/// Layout: `<dir>/<id>.<extension>`. Relative ids, `sub/name` included, are
/// placed under `<dir>`; absolute ids are used as given. The extension is
/// appended when missing. An id that names an existing directory gets a
/// random file name inside that directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    extension: String,
}

impl FileCache {
    pub fn new<P: Into<PathBuf>, E: Into<String>>(dir: P, extension: E) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Location an id points at, before the extension is applied
    ///
    /// Absolute ids are taken as given, relative ones (even with several
    /// components) live under the cache directory.
    fn target(&self, id: &str) -> PathBuf {
        let candidate = Path::new(id);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.dir.join(candidate)
        }
    }

    /// Resolve an id to the file it is stored in
    ///
    /// Returns `None` when the id names a directory; only `save` can
    /// invent a file name for those.
    fn resolve(&self, id: &str) -> Option<PathBuf> {
        let target = self.target(id);
        if target.is_dir() {
            return None;
        }

        Some(self.with_extension(target))
    }

    fn with_extension(&self, path: PathBuf) -> PathBuf {
        if self.extension.is_empty() {
            return path;
        }

        let suffix = format!(".{}", self.extension);
        if path.to_string_lossy().ends_with(&suffix) {
            return path;
        }

        let mut name: OsString = path.into_os_string();
        name.push(&suffix);
        PathBuf::from(name)
    }

    fn save_path(&self, id: &str) -> PathBuf {
        match self.resolve(id) {
            Some(path) => path,
            None => self.with_extension(self.target(id).join(random_id())),
        }
    }
}

impl Cache for FileCache {
    fn save(&self, id: &str, data: &str) -> Result<PathBuf> {
        let path = self.save_path(id);
        let parent = path.parent().unwrap_or_else(|| Path::new("."));

        if !parent.is_dir() {
            return Err(Error::NotWritable {
                path: parent.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "directory does not exist"),
            });
        }

        let written = fs::File::create(&path).and_then(|mut file| {
            file.write_all(data.as_bytes())?;
            file.sync_all()
        });

        if let Err(source) = written {
            // Never leave a truncated script behind
            if path.exists() {
                let _ = fs::remove_file(&path);
            }
            return Err(Error::NotWritable { path, source });
        }

        debug!(
            operation = "cache.save",
            path = %path.display(),
            size_bytes = data.len(),
            "cache entry written"
        );

        Ok(path)
    }

    fn fetch(&self, id: &str) -> Result<String> {
        let path = self
            .resolve(id)
            .ok_or_else(|| Error::NotExists(id.to_string()))?;

        match fs::read_to_string(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::NotExists(path.display().to_string()))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn delete(&self, id: &str) -> Result<()> {
        let Some(path) = self.resolve(id) else {
            return Ok(());
        };

        // Only the file name is a pattern, the directory is taken literally
        let file_pattern = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pattern = match path.parent() {
            Some(parent) if parent != Path::new("") => {
                format!(
                    "{}/{}",
                    Pattern::escape(&parent.to_string_lossy()),
                    file_pattern
                )
            }
            _ => file_pattern,
        };

        let entries = glob(&pattern)
            .map_err(|e| Error::NotExists(format!("invalid cache pattern {}: {}", id, e)))?;

        let mut removed = 0usize;
        for entry in entries.flatten() {
            if entry.is_file() {
                fs::remove_file(&entry)?;
                removed += 1;
            }
        }

        debug!(
            operation = "cache.delete",
            pattern = %pattern,
            entry_count = removed,
            "cache entries deleted"
        );

        Ok(())
    }

    fn exists(&self, id: &str) -> bool {
        self.resolve(id).map(|path| path.is_file()).unwrap_or(false)
    }
}
