//! Integration tests for distrolint-cli.
//!
//! Note: Tests use `unwrap`/`expect` which is acceptable in test code.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use distrolint_core::formats::ArchiveSource;
use distrolint_core::test_utils::TarTestBuilder;
use distrolint_core::test_utils::minimal_image;
use distrolint_core::types::Architecture;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use tempfile::TempDir;

fn distrolint_cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("distrolint");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_image(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).expect("failed to write image");
    path
}

fn sha256(path: &Path) -> String {
    ArchiveSource::open(path).unwrap().sha256_hex()
}

#[test]
fn test_version_flag() {
    distrolint_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("distrolint"));
}

#[test]
fn test_help_flag() {
    distrolint_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("manifest"));
}

#[test]
fn test_check_help() {
    distrolint_cmd()
        .arg("check")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Validate one distribution archive"));
}

#[test]
fn test_check_clean_image() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let image = write_image(temp.path(), "test.wsl", &minimal_image(Architecture::X64).build_gzip());

    distrolint_cmd()
        .arg("check")
        .arg(&image)
        .assert()
        .success()
        .stdout(predicate::str::contains("passed"))
        .stdout(predicate::str::contains("gzip compressed data"));
}

#[test]
fn test_check_wrong_architecture_fails() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let image = write_image(temp.path(), "test.wsl", &minimal_image(Architecture::X64).build_xz());

    distrolint_cmd()
        .arg("check")
        .arg(&image)
        .arg("--arm64")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("failed"))
        .stdout(predicate::str::contains(
            "file: \"/bin/bash\" has unexpected magic type",
        ));
}

#[test]
fn test_check_quiet_hides_warnings() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let image = minimal_image(Architecture::X64)
        .add_file("./etc/wsl-distribution.conf", b"[oobe]\ndefaultUid = 1001\n")
        .build();
    let image = write_image(temp.path(), "test.tar", &image);

    distrolint_cmd()
        .arg("-q")
        .arg("check")
        .arg(&image)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_check_json_output() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = write_image(temp.path(), "empty.tar", &TarTestBuilder::new().build());

    let output = distrolint_cmd()
        .arg("--json")
        .arg("check")
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["operation"], "check");
    assert_eq!(json["status"], "failed");
    assert_eq!(json["data"]["sha256"], sha256(&path));
    assert_eq!(json["data"]["errors"], 5);
    assert_eq!(
        json["data"]["issues"][0]["message"],
        "File \"/etc/wsl-distribution.conf\" not found in tar"
    );
    assert_eq!(json["data"]["issues"][0]["severity"], "error");
}

#[test]
fn test_check_nonexistent_archive() {
    distrolint_cmd()
        .arg("check")
        .arg("/nonexistent/archive.wsl")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("I/O error"))
        .stderr(predicate::str::contains("HINT"));
}

#[test]
fn test_check_corrupt_archive() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = write_image(temp.path(), "junk.wsl", &[0x42; 1024]);

    distrolint_cmd()
        .arg("check")
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid archive"));
}

#[test]
fn test_manifest_annotations() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let good = write_image(temp.path(), "good.wsl", &minimal_image(Architecture::X64).build_gzip());
    let sha = sha256(&good);

    let manifest = format!(
        r#"{{
  "ModernDistributions": {{
    "Test": [
      {{
        "Name": "Test-1",
        "FriendlyName": "Test",
        "Default": true,
        "Amd64Url": {{ "Url": "good.wsl", "Sha256": "0x{sha}" }}
      }},
      {{
        "Name": "Other",
        "FriendlyName": "Other",
        "Amd64Url": {{ "Url": "good.wsl", "Sha256": "0x{sha}" }}
      }}
    ]
  }}
}}
"#
    );
    let manifest_path = temp.path().join("DistributionInfo.json");
    fs::write(&manifest_path, manifest).unwrap();

    distrolint_cmd()
        .arg("manifest")
        .arg(&manifest_path)
        .arg("--annotate")
        .assert()
        .code(1)
        .stdout(predicate::str::contains(",line=11::Test/Other: Name should start with \"Test\""));
}

#[test]
fn test_manifest_baseline_skips_unchanged() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let manifest = r#"{
  "ModernDistributions": {
    "Test": [
      { "Name": "Test-1", "FriendlyName": "Test", "Default": true,
        "Amd64Url": { "Url": "https://example.com/test.wsl", "Sha256": "00" } }
    ]
  }
}
"#;
    let manifest_path = temp.path().join("DistributionInfo.json");
    let baseline_path = temp.path().join("baseline.json");
    fs::write(&manifest_path, manifest).unwrap();
    fs::write(&baseline_path, manifest).unwrap();

    let output = distrolint_cmd()
        .arg("--json")
        .arg("manifest")
        .arg(&manifest_path)
        .arg("--baseline")
        .arg(&baseline_path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "passed");
    assert_eq!(json["data"]["entries"][0]["status"], "unchanged");
    assert_eq!(json["data"]["issues"].as_array().unwrap().len(), 0);
}

#[test]
fn test_manifest_invalid_json() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let manifest_path = temp.path().join("DistributionInfo.json");
    fs::write(&manifest_path, "{ not json").unwrap();

    distrolint_cmd()
        .arg("manifest")
        .arg(&manifest_path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("is not valid JSON"));
}

#[test]
fn test_completion_bash() {
    distrolint_cmd()
        .arg("completion")
        .arg("bash")
        .assert()
        .success()
        .stdout(predicate::str::contains("distrolint"));
}
