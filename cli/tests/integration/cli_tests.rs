//! Integration tests for the devpilot CLI skeleton
//!
//! These tests verify the CLI structure and argument parsing.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn devpilot() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("devpilot"));
    cmd.env("NO_COLOR", "1");
    cmd
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    // arg_required_else_help prints help on stderr and exits 2
    devpilot().assert().code(2).stderr(predicate::str::contains(
        "Background dev servers and guarded commands",
    ));
}

#[test]
fn test_cli_help_lists_commands() {
    devpilot()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("guard"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_cli_help_shows_policy_flags() {
    devpilot()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--read-only"))
        .stdout(predicate::str::contains("--block-dangerous"));
}

#[test]
fn test_cli_version_flag_shows_version() {
    devpilot()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("devpilot"));
}

#[test]
fn test_version_command_shows_version() {
    devpilot()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("devpilot 0.1.0"));
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let output = devpilot()
        .args(["version", "--json"])
        .output()
        .expect("command should run");
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(value["version"], "0.1.0");
}

#[test]
fn test_unknown_command_fails() {
    devpilot()
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_check_requires_a_value() {
    devpilot().args(["check", "arg"]).assert().code(2);
}

#[test]
fn test_run_rejects_invalid_script_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    devpilot()
        .env("DEVPILOT_CONFIG", dir.path().join("config.yaml"))
        .args(["run", "dev;ls", "--cwd"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("script name"));
}

#[test]
fn test_run_without_manifest_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    devpilot()
        .env("DEVPILOT_CONFIG", dir.path().join("config.yaml"))
        .args(["run", "dev", "--cwd"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("package.json"));
}
