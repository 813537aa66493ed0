//! Tests for the compliantguard binary.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::{json, Value};
use tempfile::TempDir;

fn compliantguard(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_compliantguard"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("ENVIRONMENT")
        .output()
        .expect("Failed to execute command")
}

fn write_config(dir: &Path) -> String {
    let db = dir.join("guard.db");
    let path = dir.join("config.toml");
    std::fs::write(
        &path,
        format!("[storage]\ndatabase_path = {:?}\n", db.display().to_string()),
    )
    .unwrap();
    path.display().to_string()
}

#[test]
fn test_help_lists_commands() {
    let output = compliantguard(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["serve", "scan", "import-opa", "keygen", "user", "audit", "retention"] {
        assert!(stdout.contains(command), "Help should mention {command}");
    }
}

#[test]
fn test_keygen_prints_hex_key() {
    let output = compliantguard(&["keygen"]);
    assert!(output.status.success());
    let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert_eq!(key.len(), 64);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_scan_json_output() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let assets = dir.path().join("export.json");
    std::fs::write(
        &assets,
        json!([{
            "name": "//storage.googleapis.com/phi-exports",
            "assetType": "storage.googleapis.com/Bucket",
            "resource": {"data": {"name": "phi-exports"}},
            "iamPolicy": {"bindings": [{"role": "roles/storage.objectViewer", "members": ["allUsers"]}]}
        }])
        .to_string(),
    )
    .unwrap();

    let output = compliantguard(&[
        "--config",
        &config,
        "scan",
        "--assets",
        &assets.display().to_string(),
        "--project",
        "acme-health",
        "--json",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["project_id"], "acme-health");
    assert_eq!(report["status"], "completed");
    assert!(report["total_violations"].as_u64().unwrap() >= 1);
}

#[test]
fn test_scan_unknown_policy_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let assets = dir.path().join("export.json");
    std::fs::write(&assets, "[]").unwrap();

    let output = compliantguard(&[
        "--config",
        &config,
        "scan",
        "--assets",
        &assets.display().to_string(),
        "--include",
        "pci_dss",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown policy pack: pci_dss"));
}

#[test]
fn test_user_add_then_audit_verify() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let output = compliantguard(&[
        "--config",
        &config,
        "user",
        "add",
        "--email",
        "ada@example.com",
        "--password",
        "correct horse",
        "--first-name",
        "Ada",
        "--last-name",
        "Lovelace",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("ada@example.com"));

    let output = compliantguard(&["--config", &config, "audit", "verify"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("records verified"));

    let output = compliantguard(&["--config", &config, "retention", "run"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("scans deleted=0"));
}
