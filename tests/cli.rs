//! Integration tests driving the compiled `dsx` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn dsx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("dsx");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[storage]
path = "{}/data/index"

[chunking]
min_chars = 50
max_chars = 200
overlap_chars = 20
"#,
        root.display()
    );

    let config_path = config_dir.join("dsx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_dsx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = dsx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run dsx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn init_creates_store() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_dsx(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(stdout.contains("component_datasheets"));
}

#[test]
fn init_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_dsx(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_dsx(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn stats_on_empty_store() {
    let (_tmp, config_path) = setup_test_env();
    run_dsx(&config_path, &["init"]);

    let (stdout, stderr, success) = run_dsx(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("component_datasheets"));
    assert!(stdout.contains("Records:     0"));
}

#[test]
fn delete_requires_force() {
    let (_tmp, config_path) = setup_test_env();
    run_dsx(&config_path, &["init"]);

    let (_, stderr, success) = run_dsx(&config_path, &["delete"]);
    assert!(!success, "delete without --force should be refused");
    assert!(stderr.contains("--force"));
}

#[test]
fn batch_rejects_ambiguous_sources() {
    let (tmp, config_path) = setup_test_env();
    run_dsx(&config_path, &["init"]);

    let dir = tmp.path().join("sheets");
    fs::create_dir_all(&dir).unwrap();
    let manifest = tmp.path().join("manifest.toml");
    fs::write(&manifest, "").unwrap();

    let (_, _, success) = run_dsx(
        &config_path,
        &[
            "batch",
            "--manifest",
            manifest.to_str().unwrap(),
            "--dir",
            dir.to_str().unwrap(),
        ],
    );
    assert!(!success, "batch with both --manifest and --dir should fail");
}

#[test]
fn missing_config_fails_cleanly() {
    let (tmp, _) = setup_test_env();
    let bogus = tmp.path().join("nope.toml");

    let (_, stderr, success) = run_dsx(&bogus, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("config"));
}
