//! CLI integration tests for the sessionfarm command-line interface.
//!
//! These run against the in-memory backend kind, so no external store is
//! needed. Each invocation gets a fresh, empty store.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the sessionfarm binary.
fn sessionfarm() -> Command {
    let mut cmd = Command::cargo_bin("sessionfarm").unwrap();
    cmd.env_remove("SESSIONFARM_CONFIG");
    cmd
}

/// Write a config using the in-memory backend and return its path.
fn memory_config(dir: &TempDir, extra: &str) -> PathBuf {
    let path = dir.path().join("sessionfarm.toml");
    let content = format!(
        r#"
[node]
route = "host1"

[backend]
kind = "memory"
address = "cache-a;cache-b:7000"
replicate = true
{extra}
"#
    );
    std::fs::write(&path, content).unwrap();
    path
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    sessionfarm()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("sweep"))
        .stdout(predicate::str::contains("inspect"))
        .stdout(predicate::str::contains("delete"));
}

#[test]
fn test_version_displays() {
    sessionfarm()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sessionfarm"));
}

#[test]
fn test_inspect_requires_id() {
    sessionfarm().arg("inspect").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands against the in-memory backend
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_check_reports_replica_endpoints() {
    let dir = TempDir::new().unwrap();
    let config = memory_config(&dir, "");

    sessionfarm()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("cache-a:6379"))
        .stdout(predicate::str::contains("cache-b:7000"))
        .stdout(predicate::str::contains("never"));
}

#[test]
fn test_check_json_output() {
    let dir = TempDir::new().unwrap();
    let config = memory_config(&dir, "expiry_threshold_ms = 1800000");

    let output = sessionfarm()
        .args(["--json", "check", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["kind"], "memory");
    assert_eq!(value["route"], "host1");
    assert_eq!(value["expiry_threshold_ms"], 1_800_000);
    assert_eq!(value["endpoints"].as_array().map(Vec::len), Some(2));
}

#[test]
fn test_check_rejects_malformed_address() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[backend]\nkind = \"memory\"\naddress = \"host:\"\n").unwrap();

    sessionfarm()
        .arg("--config")
        .arg(&path)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("backend"));
}

#[test]
fn test_unknown_backend_kind_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[backend]\nkind = \"riak\"\n").unwrap();

    sessionfarm()
        .arg("--config")
        .arg(&path)
        .arg("check")
        .assert()
        .failure();
}

#[test]
fn test_sweep_dry_run_on_empty_store() {
    let dir = TempDir::new().unwrap();
    let config = memory_config(&dir, "expiry_threshold_ms = 1000");

    sessionfarm()
        .arg("--config")
        .arg(&config)
        .args(["sweep", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would remove"));
}

#[test]
fn test_inspect_missing_session_fails() {
    let dir = TempDir::new().unwrap();
    let config = memory_config(&dir, "");

    sessionfarm()
        .arg("--config")
        .arg(&config)
        .args(["inspect", "abc.host2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'abc' not found"));
}

#[test]
fn test_delete_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = memory_config(&dir, "");

    sessionfarm()
        .arg("--config")
        .arg(&config)
        .args(["delete", "abc.host1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("abc"));
}
