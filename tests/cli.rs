//! CLI surface tests.
//!
//! These drive the real binary but never assume a running daemon: they
//! cover argument parsing, help text, and the connection-failure path.

use assert_cmd::Command;
use predicates::prelude::*;

fn keyward() -> Command {
    Command::cargo_bin("keyward").expect("binary builds")
}

#[test]
fn test_help_lists_core_commands() {
    keyward()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("lease"))
        .stdout(predicate::str::contains("revoke"))
        .stdout(predicate::str::contains("killswitch"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn test_version_flag() {
    keyward()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("keyward"));
}

#[test]
fn test_status_without_daemon_fails_with_hint() {
    let dir = tempfile::tempdir().unwrap();
    keyward()
        .args(["--socket"])
        .arg(dir.path().join("nope.sock"))
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("connection to daemon failed"))
        .stderr(predicate::str::contains("keyward serve"));
}

#[test]
fn test_revoke_requires_a_scope() {
    let dir = tempfile::tempdir().unwrap();
    keyward()
        .args(["--socket"])
        .arg(dir.path().join("nope.sock"))
        .arg("revoke")
        .assert()
        .failure()
        .stderr(predicate::str::contains("lease-id required"));
}

#[test]
fn test_completions_generate() {
    keyward()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keyward"));
}
