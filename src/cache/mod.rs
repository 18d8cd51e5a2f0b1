pub mod cache_dir;
pub mod file;

pub use cache_dir::default_cache_dir;
pub use file::{random_id, FileCache};

use crate::error::Result;
use std::path::PathBuf;

/// Text blob store used for compiled skeletons and temporary scripts
pub trait Cache: Send + Sync {
    /// Store `data` under `id` and return the location it was written to
    fn save(&self, id: &str, data: &str) -> Result<PathBuf>;

    /// Retrieve the blob stored under `id`
    fn fetch(&self, id: &str) -> Result<String>;

    /// Delete every blob matching `id`, which may contain shell wildcards
    fn delete(&self, id: &str) -> Result<()>;

    /// Check if a blob exists
    fn exists(&self, id: &str) -> bool;
}
