//! `ctb` binary scenarios that need no upstream.

use std::path::PathBuf;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn config_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("config")
}

fn ctb() -> Command {
    let mut cmd = Command::cargo_bin("ctb").expect("ctb binary");
    cmd.env_remove("CTB_CLIENT_SECRET")
        .env_remove("CTB_ACCESS_TOKEN")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn config_hash_prints_hash_and_merged_json() {
    let base = config_dir().join("defaults/bridge.yaml");
    let ws = config_dir().join("envs/websocket.yaml");

    ctb()
        .arg("config-hash")
        .arg(&base)
        .arg(&ws)
        .assert()
        .success()
        .stdout(predicate::str::is_match("^config_hash=[0-9a-f]{64}\n").unwrap())
        .stdout(predicate::str::contains("\"framing\":\"self_framed\""))
        .stdout(predicate::str::contains("\"connect_ms\":20000"));
}

#[test]
fn config_hash_is_order_sensitive() {
    let base = config_dir().join("defaults/bridge.yaml");
    let ws = config_dir().join("envs/websocket.yaml");

    let forward = ctb().arg("config-hash").arg(&base).arg(&ws).output().unwrap();
    let reverse = ctb().arg("config-hash").arg(&ws).arg(&base).output().unwrap();
    assert!(forward.status.success() && reverse.status.success());
    assert_ne!(forward.stdout, reverse.stdout);
}

#[test]
fn config_hash_refuses_missing_file() {
    ctb()
        .arg("config-hash")
        .arg(config_dir().join("does-not-exist.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read yaml path"));
}

#[test]
fn sync_validation_failure_prints_response_and_fails() {
    ctb()
        .args([
            "sync",
            "--host",
            "demo",
            "--client-id",
            "123_abc",
            "--client-secret",
            "s",
            "--access-token",
            "t",
            "--account-id",
            "not-a-number",
            "--from",
            "2023-11-14T22:13:20Z",
            "--to",
            "later",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"ok\": false"))
        .stdout(predicate::str::contains(
            "missing required fields: ctidAccountId, toTimestamp",
        ))
        .stderr(predicate::str::contains("SYNC_FAILED"));
}

#[test]
fn sync_requires_credentials() {
    ctb()
        .args(["sync", "--host", "demo", "--client-id", "x", "--account-id", "1"])
        .args(["--from", "0", "--to", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--client-secret"));
}
