//! CLI integration tests
//!
//! These tests verify that the binary works correctly with various options.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const MAIN: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:tools="http://schemas.android.com/tools"
    package="com.example.app">
    <application android:label="${appName}" android:name=".App">
        <activity android:name=".Main" tools:replace="label" android:label="main"/>
    </application>
</manifest>"#;

const LIBRARY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    package="com.example.lib1">
    <application>
        <activity android:name="com.example.app.Main" android:label="lib"/>
        <service android:name=".Sync"/>
    </application>
</manifest>"#;

/// Write the main and library manifests into a fresh directory
fn fixtures() -> (TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("AndroidManifest.xml");
    let library = dir.path().join("lib1.xml");
    std::fs::write(&main, MAIN).unwrap();
    std::fs::write(&library, LIBRARY).unwrap();
    (dir, main, library)
}

fn manifestmerger() -> Command {
    Command::cargo_bin("manifestmerger").unwrap()
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_cli_help() {
    manifestmerger()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("manifestmerger"))
        .stdout(predicate::str::contains("--lib"))
        .stdout(predicate::str::contains("--placeholder"));
}

#[test]
fn test_cli_version() {
    manifestmerger()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("manifestmerger"));
}

// ============================================================================
// Merge Tests
// ============================================================================

#[test]
fn test_cli_merge_to_file() {
    let (dir, main, library) = fixtures();
    let out = dir.path().join("merged.xml");

    manifestmerger()
        .arg(&main)
        .arg("--lib")
        .arg(&library)
        .args(["--placeholder", "appName=Demo", "-q"])
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Merging result"));

    let merged = read(&out);
    assert!(merged.contains("android:label=\"Demo\""));
    assert!(merged.contains("com.example.lib1.Sync"));
    assert!(!merged.contains("tools:"));
}

#[test]
fn test_cli_merge_to_stdout() {
    let (_dir, main, library) = fixtures();

    manifestmerger()
        .arg(&main)
        .arg("--lib")
        .arg(&library)
        .args(["--merge-type", "library", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<manifest"))
        .stdout(predicate::str::contains("tools:replace=\"label\""));
}

#[test]
fn test_cli_missing_placeholder_fails() {
    let (dir, main, library) = fixtures();
    let out = dir.path().join("merged.xml");

    manifestmerger()
        .arg(&main)
        .arg("--lib")
        .arg(&library)
        .arg("--out")
        .arg(&out)
        .arg("-q")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("appName"));

    assert!(!out.exists());
}

#[test]
fn test_cli_json_report_and_logs() {
    let (dir, main, library) = fixtures();
    let out = dir.path().join("merged.xml");
    let report = dir.path().join("report.json");
    let log = dir.path().join("actions.txt");
    let blame = dir.path().join("blame.txt");

    manifestmerger()
        .arg(&main)
        .arg("--lib")
        .arg(&library)
        .args(["--placeholder", "appName=Demo"])
        .args(["--property", "versionCode=42"])
        .args(["--feature", "extract-fqcns"])
        .args(["--format", "json", "-q"])
        .arg("--out")
        .arg(&out)
        .arg("--report")
        .arg(&report)
        .arg("--log-file")
        .arg(&log)
        .arg("--blame")
        .arg(&blame)
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_str(&read(&report)).unwrap();
    assert_eq!(json["result"], "SUCCESS");

    let merged = read(&out);
    assert!(merged.contains("android:versionCode=\"42\""));
    assert!(merged.contains("android:name=\".App\""));

    assert!(read(&log).starts_with("manifest-merger-actions v1"));
    assert!(read(&blame).contains("-->"));
}

#[test]
fn test_cli_config_file() {
    let (dir, main, library) = fixtures();
    let out = dir.path().join("merged.xml");
    let config = dir.path().join("merge.yml");
    std::fs::write(
        &config,
        format!(
            "merge:\n  libraries: ['{}']\nplaceholders:\n  appName: Configured\noverrides:\n  version_name: \"2.0\"\n",
            library.display()
        ),
    )
    .unwrap();

    manifestmerger()
        .arg(&main)
        .arg("--config")
        .arg(&config)
        .arg("--out")
        .arg(&out)
        .arg("-q")
        .assert()
        .success();

    let merged = read(&out);
    assert!(merged.contains("android:label=\"Configured\""));
    assert!(merged.contains("android:versionName=\"2.0\""));
    assert!(merged.contains("com.example.lib1.Sync"));
}

#[test]
fn test_cli_default_config_location() {
    let (dir, main, _) = fixtures();
    let out = dir.path().join("merged.xml");
    std::fs::write(
        dir.path().join(".manifestmerger.toml"),
        "[placeholders]\nappName = \"FromToml\"\n",
    )
    .unwrap();

    manifestmerger()
        .arg(&main)
        .arg("--out")
        .arg(&out)
        .arg("-q")
        .assert()
        .success();

    assert!(read(&out).contains("android:label=\"FromToml\""));
}

#[test]
fn test_cli_rejects_bad_arguments() {
    let (_dir, main, _) = fixtures();

    manifestmerger()
        .arg(&main)
        .args(["--placeholder", "novalue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));

    manifestmerger()
        .arg(&main)
        .args(["--feature", "no-such-feature"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown feature"));
}

#[test]
fn test_cli_missing_input() {
    let dir = tempfile::tempdir().unwrap();

    manifestmerger()
        .arg(dir.path().join("missing.xml"))
        .arg("-q")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Failed to load"));
}
