use std::path::PathBuf;

/// Get default cache directory following XDG conventions
///
/// - Linux/Unix: $XDG_CACHE_HOME/spectre or ~/.cache/spectre
/// - macOS: ~/Library/Caches/spectre
/// - Windows: %LOCALAPPDATA%/spectre
pub fn default_cache_dir() -> PathBuf {
    if let Some(cache_dir) = dirs::cache_dir() {
        cache_dir.join("spectre")
    } else {
        // Generated scripts are short-lived, the temp dir is an acceptable home
        std::env::temp_dir().join("spectre")
    }
}
