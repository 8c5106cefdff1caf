//! Configuration integration tests.
//!
//! These tests verify config discovery, format parsing, and precedence
//! from an end-to-end perspective using the compiled binary. Each project
//! carries a package.json at 1.0.0 and a pyproject.toml at 2.0.0, so the
//! version `version show` reports tells which config was applied.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

const PYPROJECT_TOML: &str = "[version]\nfiles = [\"pyproject.toml\"]\n";
const PYPROJECT_YAML: &str = "version:\n  files:\n    - pyproject.toml\n";

fn project(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("package.json"),
        "{\n  \"name\": \"demo\",\n  \"version\": \"1.0.0\"\n}\n",
    )
    .unwrap();
    fs::write(
        dir.join("pyproject.toml"),
        "[project]\nname = \"demo\"\nversion = \"2.0.0\"\n",
    )
    .unwrap();
}

/// Version reported by `version show --json` when run in `dir`.
fn shown_version(dir: &Path) -> serde_json::Value {
    let output = cmd()
        .env("SHIPMARK_LOG_DIR", dir.join(".logs"))
        .arg("-C")
        .arg(dir)
        .args(["--json", "version", "show"])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout)
        .expect("version show --json should output valid JSON");
    json["version"].clone()
}

fn run_in(dir: &Path) -> assert_cmd::assert::Assert {
    cmd()
        .env("SHIPMARK_LOG_DIR", dir.join(".logs"))
        .arg("-C")
        .arg(dir)
        .args(["version", "show"])
        .assert()
}

// =============================================================================
// Config File Discovery
// =============================================================================

#[test]
fn runs_without_config_file() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    assert_eq!(shown_version(tmp.path()), "1.0.0");
}

#[test]
fn discovers_dotfile_config_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    fs::write(tmp.path().join(".shipmark.toml"), PYPROJECT_TOML).unwrap();
    assert_eq!(shown_version(tmp.path()), "2.0.0");
}

#[test]
fn discovers_regular_config_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    fs::write(tmp.path().join("shipmark.toml"), PYPROJECT_TOML).unwrap();
    assert_eq!(shown_version(tmp.path()), "2.0.0");
}

#[test]
fn discovers_legacy_rc_config() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    fs::write(
        tmp.path().join(".shipmarkrc.json"),
        r#"{"version": {"files": ["pyproject.toml"]}}"#,
    )
    .unwrap();
    assert_eq!(shown_version(tmp.path()), "2.0.0");
}

#[test]
fn discovers_config_in_parent_directory() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("nested").join("deep");
    project(&sub_dir);
    fs::write(tmp.path().join(".shipmark.toml"), PYPROJECT_TOML).unwrap();
    assert_eq!(shown_version(&sub_dir), "2.0.0");
}

#[test]
fn dotfile_takes_precedence_over_regular_name() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    fs::write(tmp.path().join(".shipmark.toml"), PYPROJECT_TOML).unwrap();
    fs::write(
        tmp.path().join("shipmark.toml"),
        "[version]\nfiles = [\"package.json\"]\n",
    )
    .unwrap();
    assert_eq!(shown_version(tmp.path()), "2.0.0");
}

#[test]
fn explicit_config_flag_is_applied() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    let config = tmp.path().join("custom.yaml");
    fs::write(&config, PYPROJECT_YAML).unwrap();

    cmd()
        .env("SHIPMARK_LOG_DIR", tmp.path().join(".logs"))
        .arg("-C")
        .arg(tmp.path())
        .arg("--config")
        .arg(&config)
        .args(["version", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2.0.0"));
}

// =============================================================================
// Config Format Parsing
// =============================================================================

#[test]
fn parses_yaml_and_yml_config() {
    for name in [".shipmark.yaml", ".shipmark.yml"] {
        let tmp = TempDir::new().unwrap();
        project(tmp.path());
        fs::write(tmp.path().join(name), PYPROJECT_YAML).unwrap();
        assert_eq!(shown_version(tmp.path()), "2.0.0", "{name}");
    }
}

#[test]
fn parses_json_config() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    fs::write(
        tmp.path().join(".shipmark.json"),
        r#"{"log_level": "error", "version": {"files": ["pyproject.toml"]}}"#,
    )
    .unwrap();
    assert_eq!(shown_version(tmp.path()), "2.0.0");
}

#[test]
fn accepts_camel_case_keys() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    fs::write(
        tmp.path().join(".shipmark.json"),
        r#"{"logLevel": "warn", "version": {"tagPrefix": "release-", "files": [{"path": "pyproject.toml"}]}}"#,
    )
    .unwrap();
    assert_eq!(shown_version(tmp.path()), "2.0.0");
}

#[test]
fn version_file_objects_with_keys() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    fs::write(
        tmp.path().join("Chart.yaml"),
        "name: demo\nversion: 0.1.0\nappVersion: 3.0.0\n",
    )
    .unwrap();
    fs::write(
        tmp.path().join(".shipmark.yml"),
        "version:\n  files:\n    - path: Chart.yaml\n      key: appVersion\n",
    )
    .unwrap();
    assert_eq!(shown_version(tmp.path()), "3.0.0");
}

// =============================================================================
// Config Precedence
// =============================================================================

#[test]
fn closer_config_takes_precedence() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("project");
    project(&sub_dir);

    fs::write(tmp.path().join(".shipmark.toml"), PYPROJECT_TOML).unwrap();
    fs::write(
        sub_dir.join(".shipmark.toml"),
        "[version]\nfiles = [\"package.json\"]\n",
    )
    .unwrap();

    assert_eq!(shown_version(&sub_dir), "1.0.0");
}

#[test]
fn toml_preferred_over_yaml_in_same_directory() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    fs::write(tmp.path().join(".shipmark.toml"), PYPROJECT_TOML).unwrap();
    fs::write(
        tmp.path().join(".shipmark.yaml"),
        "version:\n  files:\n    - package.json\n",
    )
    .unwrap();
    assert_eq!(shown_version(tmp.path()), "2.0.0");
}

// =============================================================================
// Error Cases
// =============================================================================

#[test]
fn invalid_toml_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    fs::write(tmp.path().join(".shipmark.toml"), "this is not valid toml [[[").unwrap();

    run_in(tmp.path())
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn invalid_yaml_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    fs::write(
        tmp.path().join(".shipmark.yaml"),
        "invalid:\n  yaml\n content:\n[broken",
    )
    .unwrap();

    run_in(tmp.path()).failure();
}

#[test]
fn invalid_json_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    fs::write(tmp.path().join(".shipmark.json"), "{not valid json}").unwrap();

    run_in(tmp.path()).failure();
}

#[test]
fn unknown_config_field_is_ignored() {
    let tmp = TempDir::new().unwrap();
    project(tmp.path());
    fs::write(
        tmp.path().join(".shipmark.toml"),
        r#"
log_level = "info"
unknown_field = "should be ignored"
another_unknown = 42
"#,
    )
    .unwrap();

    run_in(tmp.path()).success();
}

// =============================================================================
// Boundary Marker Tests
// =============================================================================

#[test]
fn git_boundary_stops_config_search() {
    let tmp = TempDir::new().unwrap();

    // parent/.shipmark.toml + parent/repo/.git/ + parent/repo/src/
    let parent = tmp.path().join("parent");
    let repo = parent.join("repo");
    let src = repo.join("src");
    project(&src);
    fs::write(parent.join(".shipmark.toml"), PYPROJECT_TOML).unwrap();
    fs::create_dir(repo.join(".git")).unwrap();

    assert_eq!(shown_version(&src), "1.0.0");
}

#[test]
fn config_in_same_dir_as_git_is_found() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    let src = repo.join("src");
    project(&src);
    fs::create_dir(repo.join(".git")).unwrap();
    fs::write(repo.join(".shipmark.toml"), PYPROJECT_TOML).unwrap();

    assert_eq!(shown_version(&src), "2.0.0");
}
