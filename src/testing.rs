//! Helpers shared by unit tests

use std::fs;
use std::path::{Path, PathBuf};

/// Stand-in for the headless runtime: runs the script (its last argument)
/// with /bin/sh, ignoring any runtime options before it
pub(crate) const FAKE_ENGINE: &str = r#"#!/bin/sh
for arg in "$@"; do
    script="$arg"
done
exec /bin/sh "$script"
"#;

pub(crate) fn write_fake_engine(dir: &Path) -> PathBuf {
    let path = dir.join("fake-runtime");
    fs::write(&path, FAKE_ENGINE).unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
    }

    path
}

/// Factory wired to the fake runtime, caching under `<dir>/cache`
pub(crate) fn test_factory(dir: &Path) -> crate::procedure::ProcedureFactory {
    use crate::cache::FileCache;
    use crate::engine::Engine;
    use crate::parser::JsonParser;
    use crate::template::HandlebarsRenderer;
    use std::sync::Arc;

    let cache_dir = dir.join("cache");
    fs::create_dir_all(&cache_dir).unwrap();
    let engine = Engine::with_path(write_fake_engine(dir)).unwrap();

    crate::procedure::ProcedureFactory::new(
        Arc::new(engine),
        Arc::new(JsonParser),
        Arc::new(FileCache::new(cache_dir, "js")),
        Arc::new(HandlebarsRenderer),
    )
}

/// Validator procedure for the fake runtime, checking scripts with `sh -n`
pub(crate) const SHELL_VALIDATOR: &str = r#"script_file=$(mktemp)
cat > "$script_file" <<'SPECTRE_EOF'
{{{input.script}}}
SPECTRE_EOF
if sh -n "$script_file" 2>/dev/null; then
    echo '{"errors":[]}'
else
    echo '{"errors":[{"message":"syntax error","line":1}]}'
fi
rm -f "$script_file"
"#;

/// Termination statement for shell scripts run by the fake runtime
pub(crate) const SHELL_TERMINATION: &str = r"\bexit\b";
