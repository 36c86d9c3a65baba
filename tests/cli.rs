//! End-to-end tests for the release CLI.
//!
//! Every run publishes into a local directory so no network access is
//! needed. CI variables are cleared so the host environment cannot leak
//! a tag or token into the run.

use assert_cmd::cargo;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper function to create a release command rooted at `dir`
fn modpack(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(cargo::cargo_bin!("kodegen_bundler_modpack"));
    cmd.current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("GITHUB_REF_NAME")
        .env_remove("GITHUB_REF")
        .env_remove("GITHUB_TOKEN")
        .env_remove("GITHUB_REPOSITORY")
        .env_remove("GITHUB_API_URL")
        .env_remove("MOD_NAME");
    cmd
}

/// Helper to lay out a small mod source tree
fn setup_mod() -> TempDir {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("mod");
    fs::create_dir_all(src.join("locale/en")).unwrap();
    fs::write(src.join("info.json"), r#"{"name":"example-mod"}"#).unwrap();
    fs::write(src.join("control.lua"), "script.on_init(function() end)\n").unwrap();
    fs::write(src.join("locale/en/strings.cfg"), "[mod-name]\nexample-mod=Example\n").unwrap();
    temp
}

fn read_record(dir: &Path, tag: &str) -> serde_json::Value {
    let text = fs::read_to_string(dir.join("releases").join(tag).join("release.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

fn asset_names(record: &serde_json::Value) -> Vec<String> {
    let mut names: Vec<String> = record["assets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    names
}

// =============================================================================
// SUCCESSFUL RUNS
// =============================================================================

#[test]
fn test_tag_release_publishes_archive_and_checksum() {
    let temp = setup_mod();

    modpack(temp.path())
        .args(["--tag", "v2.0.0", "--name", "example-mod", "--source", "mod"])
        .args(["--publish-dir", "releases"])
        .assert()
        .success()
        .stdout(predicate::str::contains("example-mod-2.0.0.zip"))
        .stdout(predicate::str::contains("example-mod-2.0.0.zip.sha256sum"));

    let archive = temp.path().join("output/example-mod-2.0.0.zip");
    let sidecar = temp.path().join("output/example-mod-2.0.0.zip.sha256sum");
    assert!(archive.is_file());

    let line = fs::read_to_string(&sidecar).unwrap();
    let (digest, name) = line.trim_end().split_once("  ").unwrap();
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(name, "example-mod-2.0.0.zip");

    let record = read_record(temp.path(), "v2.0.0");
    assert_eq!(record["tag"], "v2.0.0");
    assert_eq!(record["name"], "example-mod 2.0.0");
    assert_eq!(record["prerelease"], false);
    assert_eq!(
        asset_names(&record),
        ["example-mod-2.0.0.zip", "example-mod-2.0.0.zip.sha256sum"]
    );
    assert_eq!(
        fs::read(temp.path().join("releases/v2.0.0/assets/example-mod-2.0.0.zip")).unwrap(),
        fs::read(&archive).unwrap()
    );
}

#[test]
fn test_tag_is_read_from_github_ref() {
    let temp = setup_mod();

    modpack(temp.path())
        .env("GITHUB_REF", "refs/tags/v1.4.0")
        .env("MOD_NAME", "example-mod")
        .args(["--source", "mod", "--publish-dir", "releases", "--format", "tar.gz"])
        .assert()
        .success();

    assert!(temp.path().join("output/example-mod-1.4.0.tar.gz").is_file());
    assert!(temp.path().join("output/example-mod-1.4.0.tar.gz.sha256sum").is_file());
    assert!(temp.path().join("releases/v1.4.0/release.json").is_file());
}

#[test]
fn test_config_file_supplies_defaults() {
    let temp = setup_mod();
    fs::write(
        temp.path().join("modpack.toml"),
        r#"
name = "example-mod"
source = "mod"
exclude = ["*.cfg"]

[release]
directory = "releases"
title = "Example {{version}}"
"#,
    )
    .unwrap();

    modpack(temp.path()).args(["--tag", "v3.1.0"]).assert().success();

    let record = read_record(temp.path(), "v3.1.0");
    assert_eq!(record["name"], "Example 3.1.0");
    assert!(temp.path().join("output/example-mod-3.1.0.zip").is_file());
}

#[test]
fn test_rerun_for_same_tag_replaces_assets() {
    let temp = setup_mod();
    let run = || {
        modpack(temp.path())
            .args(["--tag", "v2.0.0", "--name", "example-mod", "--source", "mod"])
            .args(["--publish-dir", "releases"])
            .assert()
            .success();
    };

    run();
    let first = fs::read_to_string(temp.path().join("output/example-mod-2.0.0.zip.sha256sum")).unwrap();
    run();
    let second = fs::read_to_string(temp.path().join("output/example-mod-2.0.0.zip.sha256sum")).unwrap();

    assert_eq!(first, second);
    let record = read_record(temp.path(), "v2.0.0");
    assert_eq!(
        asset_names(&record),
        ["example-mod-2.0.0.zip", "example-mod-2.0.0.zip.sha256sum"]
    );
}

#[cfg(unix)]
#[test]
fn test_build_command_output_is_published() {
    let temp = setup_mod();

    modpack(temp.path())
        .args(["--tag", "v0.3.0", "--name", "example-mod", "--source", "mod"])
        .args(["--publish-dir", "releases", "--build-command", "sh"])
        .args(["--build-arg", "-c", "--build-arg", "printf built > \"$MOD_OUTPUT_FILE\""])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(temp.path().join("output/example-mod-0.3.0.zip")).unwrap(),
        "built"
    );
    assert!(temp.path().join("releases/v0.3.0/assets/example-mod-0.3.0.zip.sha256sum").is_file());
}

#[test]
fn test_rerun_from_project_root_is_reproducible() {
    let temp = setup_mod();
    let root = temp.path().join("mod");
    let run = || {
        modpack(&root)
            .args(["--tag", "v2.0.0", "--name", "example-mod", "--output-dir", "."])
            .args(["--publish-dir", "releases"])
            .assert()
            .success();
        fs::read_to_string(root.join("example-mod-2.0.0.zip.sha256sum")).unwrap()
    };

    let first = run();
    let second = run();

    assert_eq!(first, second);
    assert!(root.join("releases/v2.0.0/release.json").is_file());
}

// =============================================================================
// FAILURES
// =============================================================================

#[test]
fn test_missing_tag_fails_before_building() {
    let temp = setup_mod();

    modpack(temp.path())
        .args(["--name", "example-mod", "--source", "mod", "--publish-dir", "releases"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid tag format"));

    assert!(!temp.path().join("output").exists());
    assert!(!temp.path().join("releases").exists());
}

#[test]
fn test_tag_without_prefix_is_rejected() {
    let temp = setup_mod();

    modpack(temp.path())
        .args(["--tag", "1.2.3", "--name", "example-mod", "--source", "mod"])
        .args(["--publish-dir", "releases"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid tag format '1.2.3'"));

    assert!(!temp.path().join("output").exists());
}

#[test]
fn test_missing_name_is_a_config_error() {
    let temp = setup_mod();

    modpack(temp.path())
        .args(["--tag", "v1.0.0", "--source", "mod", "--publish-dir", "releases"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--name"));
}

#[test]
fn test_missing_source_fails_build() {
    let temp = TempDir::new().unwrap();

    modpack(temp.path())
        .args(["--tag", "v1.0.0", "--name", "example-mod", "--source", "nowhere"])
        .args(["--publish-dir", "releases"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("build failed"));

    assert!(!temp.path().join("output/example-mod-1.0.0.zip").exists());
    assert!(!temp.path().join("releases").exists());
}

#[cfg(unix)]
#[test]
fn test_failing_build_command_publishes_nothing() {
    let temp = setup_mod();

    modpack(temp.path())
        .args(["--tag", "v1.0.0", "--name", "example-mod", "--source", "mod"])
        .args(["--publish-dir", "releases", "--build-command", "sh"])
        .args(["--build-arg", "-c", "--build-arg", "echo missing locale >&2; exit 3"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing locale"));

    assert!(!temp.path().join("output/example-mod-1.0.0.zip.sha256sum").exists());
    assert!(!temp.path().join("releases").exists());
}

#[cfg(unix)]
#[test]
fn test_build_without_output_is_file_not_found() {
    let temp = setup_mod();
    fs::create_dir_all(temp.path().join("output")).unwrap();
    fs::write(temp.path().join("output/example-mod-1.0.0.zip"), "from an earlier run").unwrap();

    modpack(temp.path())
        .args(["--tag", "v1.0.0", "--name", "example-mod", "--source", "mod"])
        .args(["--publish-dir", "releases", "--build-command", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("file not found"));

    assert!(!temp.path().join("releases").exists());
}
