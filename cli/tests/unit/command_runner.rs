//! `TokioCommandRunner` against real processes.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::{Duration, Instant};

use devpilot_cli::application::ports::{CommandRunner, ExecRequest, SPAWN_FAILED_EXIT_CODE};
use devpilot_cli::domain::error::ExecError;
use devpilot_cli::infra::command_runner::TokioCommandRunner;
use devpilot_common::StreamKind;
use tokio::sync::mpsc;

fn request(parts: &[&str], timeout: Duration) -> ExecRequest {
    let command: Vec<String> = parts.iter().map(|s| (*s).to_string()).collect();
    let dir = std::env::temp_dir();
    ExecRequest::from_command(&command, &dir, timeout).unwrap()
}

#[tokio::test]
async fn test_captures_stdout_stderr_and_exit_code() {
    let runner = TokioCommandRunner::default();
    let out = runner
        .run(&request(
            &["sh", "-c", "echo out; echo err >&2; exit 3"],
            Duration::from_secs(10),
        ))
        .await
        .unwrap();
    assert_eq!(out.exit_code, 3);
    assert_eq!(out.stdout, "out\n");
    assert_eq!(out.stderr, "err\n");
    assert!(!out.success());
}

#[tokio::test]
async fn test_spawn_failure_is_an_output_not_an_error() {
    let runner = TokioCommandRunner::default();
    let out = runner
        .run(&request(&["devpilot-no-such-binary-xyz"], Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(out.exit_code, SPAWN_FAILED_EXIT_CODE);
    assert!(out.stderr.contains("devpilot-no-such-binary-xyz"));
}

#[tokio::test]
async fn test_timeout_terminates_the_child() {
    let runner = TokioCommandRunner::new(Duration::from_millis(500));
    let started = Instant::now();
    let err = runner
        .run(&request(&["sleep", "30"], Duration::from_millis(200)))
        .await
        .unwrap_err();
    let ExecError::Timeout { after, .. } = err;
    assert_eq!(after, Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_secs(5), "did not wait for the child");
}

#[tokio::test]
async fn test_timeout_keeps_output_printed_before_the_kill() {
    let runner = TokioCommandRunner::new(Duration::from_millis(500));
    let err = runner
        .run(&request(
            &["sh", "-c", "echo partial; sleep 30"],
            Duration::from_millis(500),
        ))
        .await
        .unwrap_err();
    let ExecError::Timeout { stdout, .. } = err;
    assert!(stdout.contains("partial"), "got: {stdout:?}");
}

#[tokio::test]
async fn test_timeout_escalates_when_term_is_ignored() {
    let runner = TokioCommandRunner::new(Duration::from_millis(300));
    let started = Instant::now();
    let result = runner
        .run(&request(
            &["sh", "-c", "trap '' TERM; sleep 30"],
            Duration::from_millis(300),
        ))
        .await;
    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_signal_death_maps_to_shell_convention() {
    let runner = TokioCommandRunner::default();
    let out = runner
        .run(&request(&["sh", "-c", "kill -9 $$"], Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(out.exit_code, 128 + 9);
}

#[tokio::test]
async fn test_streaming_sends_each_line() {
    let runner = TokioCommandRunner::default();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let out = runner
        .run_streaming(
            &request(&["sh", "-c", "echo a; echo b >&2"], Duration::from_secs(5)),
            tx,
        )
        .await
        .unwrap();
    assert_eq!(out.exit_code, 0);

    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        lines.push((line.stream, line.line));
    }
    assert!(lines.contains(&(StreamKind::Stdout, "a".to_string())));
    assert!(lines.contains(&(StreamKind::Stderr, "b".to_string())));
}
