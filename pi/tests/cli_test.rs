//! End-to-end tests for the `pi` binary

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const VALID: &str = r#"
own-origin: https://app.example.com
timeout-ms: 2000
peers:
  - name: auth
    origin: https://auth.example.com
    loaded-after-ms: 5
    ready-after-ms: 20
  - name: billing
    origin: https://billing.example.com
    depends-on: [auth]
    ready-after-ms: 5
"#;

const FORWARD: &str = r#"
own-origin: https://app.example.com
peers:
  - name: billing
    origin: https://billing.example.com
    depends-on: [auth]
  - name: auth
    origin: https://auth.example.com
"#;

const STUCK: &str = r#"
own-origin: https://app.example.com
timeout-ms: 200
peers:
  - name: search
    origin: https://search.example.com
  - name: results
    origin: https://results.example.com
    depends-on: [search]
    ready-after-ms: 5
"#;

/// `pi` running inside `temp` with logs and config kept there too
fn pi(temp: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pi").unwrap();
    cmd.current_dir(temp)
        .env("XDG_DATA_HOME", temp.join("data"))
        .env("XDG_CONFIG_HOME", temp.join("config"))
        .env("HOME", temp);
    cmd
}

fn write(temp: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = temp.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_check_valid_topology() {
    let temp = TempDir::new().unwrap();
    let path = write(&temp, "topology.yml", VALID);

    pi(temp.path())
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Topology OK: 2 peer(s)"))
        .stdout(predicate::str::contains("after auth"));
}

#[test]
fn test_check_rejects_forward_dependency() {
    let temp = TempDir::new().unwrap();
    let path = write(&temp, "topology.yml", FORWARD);

    pi(temp.path())
        .arg("check")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("listed after it"));
}

#[test]
fn test_check_missing_file() {
    let temp = TempDir::new().unwrap();

    pi(temp.path())
        .arg("check")
        .arg(temp.path().join("nope.yml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read topology file"));
}

#[test]
fn test_run_reports_json() {
    let temp = TempDir::new().unwrap();
    let path = write(&temp, "topology.yml", VALID);

    pi(temp.path())
        .args(["run", "--format", "json"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"initialized_peers\": 2"))
        .stdout(predicate::str::contains("\"success\": false").not());
}

#[test]
fn test_run_fails_when_peer_is_stuck() {
    let temp = TempDir::new().unwrap();
    let path = write(&temp, "topology.yml", STUCK);

    pi(temp.path())
        .arg("run")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("failed"))
        .stderr(predicate::str::contains("2 peer(s) failed: search, results"));
}

#[test]
fn test_broken_local_config_is_logged_and_skipped() {
    let temp = TempDir::new().unwrap();
    let path = write(&temp, "topology.yml", VALID);
    write(&temp, ".peerinit.yml", "coordinator: [not, a, map]\n");

    pi(temp.path()).arg("check").arg(&path).assert().success();

    let log = fs::read_to_string(temp.path().join("data/peerinit/logs/peerinit.log")).unwrap();
    assert!(log.contains("Skipping unusable config file"));
    assert!(log.contains(".peerinit.yml"));
}

#[test]
fn test_explicit_config_with_bad_origin_fails() {
    let temp = TempDir::new().unwrap();
    let path = write(&temp, "topology.yml", VALID);
    let config = write(&temp, "pi.yml", "coordinator:\n  own-origin: localhost\n");

    pi(temp.path())
        .arg("--config")
        .arg(&config)
        .arg("check")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
