//! E2E CLI workflow tests: keygen -> init -> put/delete -> records/log ->
//! branch -> merge, with JSON contract checks.
//!
//! Each test runs `otlog` as a subprocess in an isolated temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the otlog binary, rooted in `dir`.
fn otlog_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("otlog"));
    cmd.current_dir(dir);
    cmd.env("OTLOG_PASSPHRASE", "e2e passphrase");
    // Keep the user's own config out of the test.
    cmd.env("XDG_CONFIG_HOME", dir.join("xdg"));
    cmd.env_remove("OTLOG_FORMAT");
    cmd.env("OTLOG_LOG", "error");
    cmd
}

fn json_of(dir: &Path, args: &[&str]) -> Value {
    let output = otlog_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("otlog should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

/// Generate an identity and initialize a log, returning the root reference.
fn init_project(dir: &Path) -> String {
    otlog_cmd(dir).args(["keygen", "--name", "e2e.otlog"]).assert().success();
    let init = json_of(dir, &["init"]);
    init["head"].as_str().expect("head field").to_string()
}

fn put(dir: &Path, id: &str, value: &str, parent: Option<&str>) -> Value {
    let mut args = vec!["put", value, "--id", id];
    if let Some(parent) = parent {
        args.extend(["--parent", parent]);
    }
    json_of(dir, &args)
}

const ID_1: &str = "00000000-0000-0000-0000-000000000001";
const ID_2: &str = "00000000-0000-0000-0000-000000000002";
const ID_3: &str = "00000000-0000-0000-0000-000000000003";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn init_creates_layout() {
    let dir = TempDir::new().unwrap();
    let root = init_project(dir.path());

    assert!(root.starts_with("blake3:"));
    assert!(dir.path().join(".otlog/config.toml").exists());
    assert!(dir.path().join(".otlog/identity/signing.key").exists());
    assert!(dir.path().join(".otlog/blobs").is_dir());
    let head = std::fs::read_to_string(dir.path().join(".otlog/HEAD")).unwrap();
    assert_eq!(head.trim(), root);
}

#[test]
fn init_twice_requires_force() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    otlog_cmd(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    otlog_cmd(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn put_and_delete_update_records() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());

    put(dir.path(), ID_1, "{\"title\": \"first\"}", None);
    put(dir.path(), ID_2, "second", None);
    let deleted = json_of(dir.path(), &["delete", ID_1]);
    assert_eq!(deleted["op"], "del");
    assert_eq!(deleted["head_moved"], true);

    let records = json_of(dir.path(), &["records"]);
    assert_eq!(records["count"], 1);
    assert_eq!(records["records"][0]["id"], ID_2);
    assert_eq!(records["records"][0]["value"], "second");
}

#[test]
fn log_lists_newest_first() {
    let dir = TempDir::new().unwrap();
    let root = init_project(dir.path());
    let a = put(dir.path(), ID_1, "1", None);

    let log = json_of(dir.path(), &["log"]);
    let lines = log.as_array().expect("log is an array");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["reference"], a["reference"]);
    assert_eq!(lines[0]["op"], "ups");
    assert_eq!(lines[1]["reference"], root.as_str());
    assert_eq!(lines[1]["op"], "base");

    let limited = json_of(dir.path(), &["log", "--limit", "1"]);
    assert_eq!(limited.as_array().unwrap().len(), 1);
}

#[test]
fn show_decrypts_the_diff() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    put(dir.path(), ID_3, "{\"n\": 3}", None);

    let shown = json_of(dir.path(), &["show"]);
    assert_eq!(shown["op"], "ups");
    assert_eq!(shown["diff"]["op"], "ups");
    assert_eq!(shown["diff"]["rec"]["id"], ID_3);
    assert_eq!(shown["diff"]["rec"]["value"]["n"], 3);
    assert_eq!(shown["crypto_alg"], "aes256gcm-hkdf-sha256");
}

#[test]
fn branches_merge_into_head() {
    let dir = TempDir::new().unwrap();
    let root = init_project(dir.path());

    put(dir.path(), ID_1, "ours", None);
    let theirs = put(dir.path(), ID_2, "theirs", Some(&root));
    assert_eq!(theirs["head_moved"], false);
    let sibling = theirs["reference"].as_str().unwrap().to_string();

    let lca = json_of(dir.path(), &["lca", &sibling]);
    assert_eq!(lca["ancestor"], root.as_str());

    let merged = json_of(dir.path(), &["merge", &sibling]);
    assert_eq!(merged["ancestor"], root.as_str());
    assert_eq!(merged["records"], 2);
    assert!(merged["strategy"].as_str().unwrap().starts_with("rebase"));

    let head = std::fs::read_to_string(dir.path().join(".otlog/HEAD")).unwrap();
    assert_eq!(head.trim(), merged["merge"].as_str().unwrap());

    let records = json_of(dir.path(), &["records"]);
    assert_eq!(records["count"], 2);
}

#[test]
fn dry_run_merge_keeps_head() {
    let dir = TempDir::new().unwrap();
    let root = init_project(dir.path());
    let ours = put(dir.path(), ID_1, "ours", None);
    let theirs = put(dir.path(), ID_2, "theirs", Some(&root));

    let merged = json_of(
        dir.path(),
        &["merge", theirs["reference"].as_str().unwrap(), "--dry-run"],
    );
    assert!(merged.get("merge").is_none());

    let head = std::fs::read_to_string(dir.path().join(".otlog/HEAD")).unwrap();
    assert_eq!(head.trim(), ours["reference"].as_str().unwrap());
}

#[test]
fn missing_passphrase_is_reported() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    otlog_cmd(dir.path())
        .env_remove("OTLOG_PASSPHRASE")
        .arg("records")
        .assert()
        .failure()
        .stderr(predicate::str::contains("OTLOG_PASSPHRASE"));
}

#[test]
fn errors_render_as_json() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    let missing = format!("blake3:{}", "0".repeat(64));
    let output = otlog_cmd(dir.path())
        .args(["show", &missing, "--json"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).expect("JSON error on stderr");
    assert!(err["error"]["message"].as_str().unwrap().contains(&missing));
    assert!(err["error"]["error_code"].as_str().unwrap().starts_with('E'));
}

#[test]
fn commands_before_init_point_at_init() {
    let dir = TempDir::new().unwrap();
    otlog_cmd(dir.path()).args(["keygen"]).assert().success();
    otlog_cmd(dir.path())
        .arg("log")
        .assert()
        .failure()
        .stderr(predicate::str::contains("otlog init"));
}
