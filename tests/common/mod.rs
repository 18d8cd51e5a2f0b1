// Shared harness for integration tests
//
// Every test gets its own workspace holding:
// - a fake runtime that runs the generated script with /bin/sh
// - shell versions of the `validator` and `http_default` procedures,
//   which shadow the built-in JavaScript ones
// - a spectre.toml wiring both together, discovered from the workspace
//
// Nothing outside the temp directory is touched.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use spectre::SpectreConfig;

/// Runs the script (last argument) with /bin/sh, ignoring runtime options
pub const FAKE_ENGINE: &str = r#"#!/bin/sh
for arg in "$@"; do
    script="$arg"
done
exec /bin/sh "$script"
"#;

/// Checks the bound script with `sh -n` and reports in the validator format
pub const SHELL_VALIDATOR: &str = r#"script_file=$(mktemp)
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

pub const HTTP_PROCEDURE: &str = r#"{{{load "report_" procedure_type}}}
exit 0
"#;

pub const REPORT_DEFAULT: &str = r#"echo "loading {{input.url}}" >&2
printf '%s\n' '{"status": 200, "statusText": "OK", "url": "{{input.url}}", "content": "{{input.method}} {{input.body}}", "headers": [{"name": "X-Runtime", "value": "fake"}], "console": ["ready"]}'
"#;

pub const REPORT_CAPTURE: &str = r#"printf 'image' > '{{input.output_file}}'
printf '%s\n' '{"status": 200, "content": ""}'
"#;

pub const SHELL_TERMINATION: &str = r"\bexit\b";

pub struct TestWorkspace {
    temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestWorkspace {
    pub fn new() -> Self {
        let workspace = Self {
            temp_dir: TempDir::new().unwrap(),
        };

        workspace.write_executable("bin/fake-runtime", FAKE_ENGINE);
        workspace.create_file("procedures/validator.proc", SHELL_VALIDATOR);
        workspace.create_file("procedures/http_default.proc", HTTP_PROCEDURE);
        workspace.create_file("procedures/report_default.partial", REPORT_DEFAULT);
        workspace.create_file("procedures/report_capture.partial", REPORT_CAPTURE);
        fs::create_dir_all(workspace.cache_dir()).unwrap();

        let config = toml_config(&workspace.config());
        workspace.create_file("spectre.toml", &config);

        workspace
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.path().join("cache")
    }

    pub fn procedures_dir(&self) -> PathBuf {
        self.path().join("procedures")
    }

    pub fn engine_path(&self) -> PathBuf {
        self.path().join("bin/fake-runtime")
    }

    /// Configuration matching the spectre.toml written into the workspace
    pub fn config(&self) -> SpectreConfig {
        let mut config = SpectreConfig::default();
        config.engine.path = self.engine_path().display().to_string();
        config.cache.dir = Some(self.cache_dir().display().to_string());
        config.procedures.dirs = vec![self.procedures_dir().display().to_string()];
        config.validator.termination_pattern = SHELL_TERMINATION.to_string();
        config
    }

    pub fn create_file(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.path().join(path);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }

        fs::write(&file_path, content).unwrap();
        file_path
    }

    pub fn write_executable(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.create_file(path, content);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&file_path).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&file_path, perms).unwrap();
        }

        file_path
    }

    /// Names of the files currently in the cache directory
    pub fn cached_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.cache_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn toml_config(config: &SpectreConfig) -> String {
    toml::to_string_pretty(config).unwrap()
}
