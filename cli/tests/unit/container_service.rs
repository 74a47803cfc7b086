//! Container command service with a recording runner.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use devpilot_cli::application::services::container::{ContainerCommand, run_container};
use devpilot_cli::domain::config::SecurityConfig;
use devpilot_cli::domain::error::DevError;
use devpilot_cli::infra::secrets::CliSecretWrapper;

use crate::mocks::{NoSecrets, RecordingRunner, read_only};

fn cmd(action: &str, args: &[&str]) -> ContainerCommand {
    ContainerCommand {
        action: action.to_string(),
        args: args.iter().map(|a| (*a).to_string()).collect(),
        ..ContainerCommand::default()
    }
}

#[tokio::test]
async fn test_inspection_runs_with_short_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::ok("CONTAINER ID\n");
    let security = SecurityConfig::default();

    let outcome = run_container(&NoSecrets, &runner, &security, &cmd("ps", &["-a"]), dir.path())
        .await
        .unwrap();
    assert_eq!(outcome.command, "docker ps -a");
    assert_eq!(outcome.timeout, Duration::from_secs(30));

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].program, "docker");
    assert_eq!(calls[0].cwd, dir.path());
}

#[tokio::test]
async fn test_destructive_action_needs_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::ok("");
    let security = SecurityConfig::default();
    let mut rm = cmd("rm", &[]);
    rm.container = Some("web".into());

    let err = run_container(&NoSecrets, &runner, &security, &rm, dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, DevError::ConfirmationRequired(_)));
    assert!(runner.calls().is_empty(), "nothing runs before confirmation");

    rm.confirm = true;
    let outcome = run_container(&NoSecrets, &runner, &security, &rm, dir.path())
        .await
        .unwrap();
    assert_eq!(outcome.command, "docker rm web");
}

#[tokio::test]
async fn test_run_with_container_name_uses_name_flag() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::ok("");
    let security = SecurityConfig::default();
    let run = ContainerCommand {
        action: "run".into(),
        args: vec!["-d".into()],
        container: Some("cache".into()),
        image: Some("redis:7".into()),
        confirm: true,
        ..ContainerCommand::default()
    };

    let outcome = run_container(&NoSecrets, &runner, &security, &run, dir.path())
        .await
        .unwrap();
    assert_eq!(outcome.command, "docker run -d --name cache redis:7");
}

#[tokio::test]
async fn test_host_network_is_blocked_even_with_confirm() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::ok("");
    let security = SecurityConfig::default();
    let mut run = cmd("run", &["--network", "host"]);
    run.image = Some("nginx".into());
    run.confirm = true;

    let err = run_container(&NoSecrets, &runner, &security, &run, dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, DevError::Policy(_)));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_read_only_blocks_builds() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::ok("");
    let mut build = cmd("build", &["."]);
    build.confirm = true;

    let err = run_container(&NoSecrets, &runner, &read_only(), &build, dir.path())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("read-only"), "got: {err}");
}

#[tokio::test]
async fn test_timeout_is_clamped_by_config() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::ok("");
    let security = SecurityConfig {
        max_timeout_secs: 60,
        ..SecurityConfig::default()
    };
    let mut pull = cmd("pull", &[]);
    pull.image = Some("node:20".into());

    let outcome = run_container(&NoSecrets, &runner, &security, &pull, dir.path())
        .await
        .unwrap();
    assert_eq!(outcome.timeout, Duration::from_secs(60));
    assert_eq!(runner.calls()[0].timeout, Duration::from_secs(60));
}

#[tokio::test]
async fn test_runner_timeout_surfaces_as_timeout_error() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::timing_out_after("CONTAINER ID   IMAGE\n");
    let security = SecurityConfig::default();

    let err = run_container(&NoSecrets, &runner, &security, &cmd("ps", &[]), dir.path())
        .await
        .unwrap_err();
    match err {
        DevError::Timeout { after, stdout, .. } => {
            assert_eq!(after, Duration::from_secs(30));
            assert!(stdout.starts_with("CONTAINER ID"), "partial output kept: {stdout:?}");
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_secrets_wrap_mutating_actions_only() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("doppler.yaml"), "setup: {}\n").unwrap();
    let runner = RecordingRunner::ok("");
    let security = SecurityConfig::default();

    let ps = run_container(&CliSecretWrapper, &runner, &security, &cmd("ps", &[]), dir.path())
        .await
        .unwrap();
    assert_eq!(ps.command, "docker ps");

    let mut up = cmd("start", &[]);
    up.container = Some("db".into());
    let started = run_container(&CliSecretWrapper, &runner, &security, &up, dir.path())
        .await
        .unwrap();
    assert_eq!(started.command, "doppler run -- docker start db");
}

#[tokio::test]
async fn test_invalid_action_is_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::ok("");
    let security = SecurityConfig::default();

    for action in ["--rm", "PS", "ps;ls"] {
        let err = run_container(&NoSecrets, &runner, &security, &cmd(action, &[]), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DevError::Validation(_)), "{action} gave {err:?}");
    }
}
