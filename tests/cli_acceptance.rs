/// Acceptance tests for the spectre binary
///
/// Each test runs the binary inside a workspace whose spectre.toml points
/// at the fake runtime and the shell procedures.
mod common;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::prelude::*;

fn spectre(workspace: &TestWorkspace) -> Command {
    let mut cmd = Command::new(std::env!("CARGO_BIN_EXE_spectre"));
    cmd.current_dir(workspace.path())
        .env_remove("SPECTRE_CONFIG")
        .env_remove("SPECTRE_ENGINE")
        .env_remove("SPECTRE_CACHE_DIR")
        .env("SPECTRE_LOG_FORMAT", "compact");
    cmd
}

#[test]
fn test_request_prints_response() {
    let workspace = TestWorkspace::new();

    spectre(&workspace)
        .args(["request", "http://example.com/page"])
        .assert()
        .success()
        .stdout(predicate::str::contains("200 OK"))
        .stdout(predicate::str::contains("X-Runtime: fake"))
        .stdout(predicate::str::contains("GET"));
}

#[test]
fn test_request_json_output() {
    let workspace = TestWorkspace::new();

    let output = spectre(&workspace)
        .args(["request", "http://example.com/page", "--json", "-d", "q=1"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], 200);
    assert_eq!(json["url"], "http://example.com/page?q=1");
    assert_eq!(json["headers"]["X-Runtime"], "fake");
}

#[test]
fn test_request_post_with_method_flag() {
    let workspace = TestWorkspace::new();

    spectre(&workspace)
        .args([
            "request",
            "http://example.com/form",
            "--method",
            "post",
            "--data",
            "a=1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("POST a=1"));
}

#[test]
fn test_request_rejects_unknown_method() {
    let workspace = TestWorkspace::new();

    spectre(&workspace)
        .args(["request", "http://example.com", "--method", "TRACE"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported method"));
}

#[test]
fn test_request_capture() {
    let workspace = TestWorkspace::new();
    let output = workspace.path().join("shot.png");

    spectre(&workspace)
        .args(["request", "http://example.com", "--capture"])
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("Saved"));

    assert!(output.exists());
}

#[test]
fn test_request_with_missing_engine() {
    let workspace = TestWorkspace::new();

    spectre(&workspace)
        .args(["request", "http://example.com", "--engine"])
        .arg(workspace.path().join("missing-runtime"))
        .assert()
        .failure();
}

#[test]
fn test_compile_prints_skeleton() {
    let workspace = TestWorkspace::new();

    spectre(&workspace)
        .args(["compile", "http_default", "--type", "capture"])
        .assert()
        .success()
        .stdout(predicate::str::contains("printf 'image' > '{{input.output_file}}'"))
        .stdout(predicate::str::contains("exit 0"));

    assert_eq!(workspace.cached_files().len(), 1);
}

#[test]
fn test_compile_no_cache() {
    let workspace = TestWorkspace::new();

    spectre(&workspace)
        .args(["compile", "http_default", "--no-cache"])
        .assert()
        .success();

    assert!(workspace.cached_files().is_empty());
}

#[test]
fn test_validate_valid_script() {
    let workspace = TestWorkspace::new();
    let script = workspace.create_file("ok.sh", "echo '{}'\nexit 0\n");

    spectre(&workspace)
        .arg("validate")
        .arg(&script)
        .assert()
        .success()
        .stderr(predicate::str::contains("is valid"));
}

#[test]
fn test_validate_syntax_error() {
    let workspace = TestWorkspace::new();
    let script = workspace.create_file("broken.sh", "if true; then\nexit 0\n");

    spectre(&workspace)
        .arg("validate")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("syntax error"));
}

#[test]
fn test_validate_missing_termination() {
    let workspace = TestWorkspace::new();
    let script = workspace.create_file("endless.sh", "echo '{}'\n");

    spectre(&workspace)
        .arg("validate")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("termination"));
}

#[test]
fn test_cache_clear() {
    let workspace = TestWorkspace::new();
    workspace.create_file("cache/unrelated.js", "keep me");

    spectre(&workspace)
        .args(["compile", "http_default"])
        .assert()
        .success();
    assert_eq!(workspace.cached_files().len(), 2);

    spectre(&workspace)
        .args(["cache", "clear"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Cleared"));

    assert_eq!(workspace.cached_files(), vec!["unrelated.js"]);
}

#[test]
fn test_explicit_config_and_cache_dir_override() {
    let workspace = TestWorkspace::new();
    let config = workspace.path().join("spectre.toml");
    let other_cache = workspace.path().join("other-cache");

    spectre(&workspace)
        .arg("--config")
        .arg(&config)
        .arg("--cache-dir")
        .arg(&other_cache)
        .args(["compile", "http_default"])
        .assert()
        .success();

    assert!(workspace.cached_files().is_empty());
    assert_eq!(std::fs::read_dir(&other_cache).unwrap().count(), 1);
}

#[test]
fn test_invalid_config_reported() {
    let workspace = TestWorkspace::new();
    workspace.create_file("spectre.toml", "[cache]\nextension = \"a.b\"\n");

    spectre(&workspace)
        .args(["cache", "clear"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cache.extension"));
}
