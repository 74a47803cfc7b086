//! Dev-server lifecycle services end to end, with a fake manifest and real
//! background processes.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use devpilot_cli::application::registry::{ProcessRegistry, StartOutcome};
use devpilot_cli::application::services::dev_server::{
    self, StartAllSelection, StopReport,
};
use devpilot_cli::domain::config::SecurityConfig;
use devpilot_cli::domain::error::DevError;

use crate::mocks::{
    BrokenProject, FakeProject, FlakyLiveness, dev_context, eventually, fast_config, os_registry,
    read_only,
};

#[tokio::test]
async fn test_start_status_stop_status() {
    let dir = tempfile::tempdir().unwrap();
    let project = FakeProject::sleepers(&["dev", "lint"]);
    let registry = os_registry();
    let ctx = dev_context(&project, &registry, SecurityConfig::default());

    let started = dev_server::start(&ctx, None, dir.path(), false).await.unwrap();
    assert!(started.is_started());
    assert_eq!(started.info().script, "dev", "auto-detects the dev script");

    let status = dev_server::status(&ctx, dir.path()).await;
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].pid, started.info().pid);

    let report = dev_server::stop(&ctx, None, dir.path()).await.unwrap();
    match report {
        StopReport::All(outcomes) => {
            assert_eq!(outcomes.len(), 1);
            assert!(outcomes[0].exited);
        }
        StopReport::One(_) => panic!("expected a bulk stop"),
    }
    assert!(dev_server::status(&ctx, dir.path()).await.is_empty());
}

#[tokio::test]
async fn test_start_without_dev_script_lists_available() {
    let dir = tempfile::tempdir().unwrap();
    let project = FakeProject::sleepers(&["lint", "build"]);
    let registry = os_registry();
    let ctx = dev_context(&project, &registry, SecurityConfig::default());

    let err = dev_server::start(&ctx, None, dir.path(), false).await.unwrap_err();
    assert!(matches!(err, DevError::NoDevScript { .. }));
    let msg = err.to_string();
    assert!(msg.contains("lint") && msg.contains("build"), "got: {msg}");
    assert!(registry.list(None).await.is_empty());
}

#[tokio::test]
async fn test_start_unknown_script_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let project = FakeProject::sleepers(&["dev"]);
    let registry = os_registry();
    let ctx = dev_context(&project, &registry, SecurityConfig::default());

    let err = dev_server::start(&ctx, Some("storybook"), dir.path(), false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Available scripts: dev"), "got: {err}");
}

#[tokio::test]
async fn test_unreadable_manifest_is_project_error() {
    let dir = tempfile::tempdir().unwrap();
    let registry = os_registry();
    let ctx = dev_context(&BrokenProject, &registry, SecurityConfig::default());

    let err = dev_server::start(&ctx, None, dir.path(), false).await.unwrap_err();
    assert!(matches!(err, DevError::Project(_)));
}

#[tokio::test]
async fn test_read_only_blocks_mutations_but_not_status() {
    let dir = tempfile::tempdir().unwrap();
    let project = FakeProject::sleepers(&["dev"]);
    let registry = os_registry();
    let ctx = dev_context(&project, &registry, read_only());

    let err = dev_server::start(&ctx, None, dir.path(), true).await.unwrap_err();
    assert!(matches!(err, DevError::Policy(_)), "confirm does not lift read-only");
    assert!(err.to_string().starts_with("Security:"));

    assert!(dev_server::stop(&ctx, None, dir.path()).await.is_err());
    assert!(dev_server::restart(&ctx, None, dir.path(), false).await.is_err());
    assert!(
        dev_server::start_all(&ctx, &StartAllSelection::Detect, dir.path(), false)
            .await
            .is_err()
    );
    assert!(dev_server::status(&ctx, dir.path()).await.is_empty());
}

#[tokio::test]
async fn test_lifecycle_hook_needs_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let project = FakeProject::sleepers(&["postinstall"]);
    let registry = os_registry();
    let ctx = dev_context(&project, &registry, SecurityConfig::default());

    let err = dev_server::start(&ctx, Some("postinstall"), dir.path(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, DevError::ConfirmationRequired(_)));
    assert!(registry.list(None).await.is_empty());

    let started = dev_server::start(&ctx, Some("postinstall"), dir.path(), true)
        .await
        .unwrap();
    assert!(started.is_started());
    registry.stop_all(None).await;
}

#[tokio::test]
async fn test_restart_gives_new_pid() {
    let dir = tempfile::tempdir().unwrap();
    let project = FakeProject::sleepers(&["dev"]);
    let registry = os_registry();
    let ctx = dev_context(&project, &registry, SecurityConfig::default());

    let old = dev_server::start(&ctx, Some("dev"), dir.path(), false)
        .await
        .unwrap()
        .info()
        .pid;
    let outcomes = dev_server::restart(&ctx, Some("dev"), dir.path(), false)
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    let new = match &outcomes[0].result {
        Ok(StartOutcome::Started(info)) => info.pid,
        other => panic!("expected a fresh start, got {other:?}"),
    };
    assert_ne!(old, new);
    assert_eq!(dev_server::status(&ctx, dir.path()).await.len(), 1);
    registry.stop_all(None).await;
}

#[tokio::test]
async fn test_restart_starts_when_process_exits_before_the_stop() {
    let dir = tempfile::tempdir().unwrap();
    let project = FakeProject::sleepers(&["dev"]);
    let backend = FlakyLiveness::default();
    let registry = ProcessRegistry::new(backend.clone(), fast_config());
    let ctx = dev_context(&project, &registry, SecurityConfig::default());

    let old = dev_server::start(&ctx, Some("dev"), dir.path(), false)
        .await
        .unwrap()
        .info()
        .pid;
    // Alive when restart looks it up, gone by the time it stops it.
    backend.dies_after(old, 1);

    let outcomes = dev_server::restart(&ctx, Some("dev"), dir.path(), false)
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    match &outcomes[0].result {
        Ok(StartOutcome::Started(info)) => assert_ne!(info.pid, old),
        other => panic!("expected a fresh start, got {other:?}"),
    }
    registry.stop_all(None).await;
}

#[tokio::test]
async fn test_restart_all_restarts_every_running_script() {
    let dir = tempfile::tempdir().unwrap();
    let project = FakeProject::sleepers(&["dev", "api"]);
    let registry = os_registry();
    let ctx = dev_context(&project, &registry, SecurityConfig::default());

    dev_server::start(&ctx, Some("dev"), dir.path(), false).await.unwrap();
    dev_server::start(&ctx, Some("api"), dir.path(), false).await.unwrap();

    let outcomes = dev_server::restart(&ctx, None, dir.path(), false).await.unwrap();
    let scripts: Vec<&str> = outcomes.iter().map(|o| o.script.as_str()).collect();
    assert_eq!(scripts, vec!["api", "dev"]);
    assert!(outcomes.iter().all(|o| o.result.as_ref().is_ok_and(StartOutcome::is_started)));
    registry.stop_all(None).await;
}

#[tokio::test]
async fn test_restart_with_nothing_running_starts_dev() {
    let dir = tempfile::tempdir().unwrap();
    let project = FakeProject::sleepers(&["start"]);
    let registry = os_registry();
    let ctx = dev_context(&project, &registry, SecurityConfig::default());

    let outcomes = dev_server::restart(&ctx, None, dir.path(), false).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].script, "start");
    registry.stop_all(None).await;
}

#[tokio::test]
async fn test_start_all_explicit_list_reports_each_script() {
    let dir = tempfile::tempdir().unwrap();
    let project = FakeProject::sleepers(&["dev", "api"]);
    let registry = os_registry();
    let ctx = dev_context(&project, &registry, SecurityConfig::default());

    let selection = StartAllSelection::Scripts(vec!["dev".into(), "missing".into()]);
    let outcomes = dev_server::start_all(&ctx, &selection, dir.path(), false)
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].result.is_ok());
    assert!(matches!(
        outcomes[1].result,
        Err(DevError::ScriptNotFound { .. })
    ));
    registry.stop_all(None).await;
}

#[tokio::test]
async fn test_start_all_profile_keeps_declared_scripts() {
    let dir = tempfile::tempdir().unwrap();
    let project = FakeProject::sleepers(&["dev", "server"]);
    let registry = os_registry();
    let ctx = dev_context(&project, &registry, SecurityConfig::default());

    let outcomes = dev_server::start_all(
        &ctx,
        &StartAllSelection::Profile("fullstack".into()),
        dir.path(),
        false,
    )
    .await
    .unwrap();
    let scripts: Vec<&str> = outcomes.iter().map(|o| o.script.as_str()).collect();
    assert_eq!(scripts, vec!["dev", "server"]);
    registry.stop_all(None).await;
}

#[tokio::test]
async fn test_start_all_unknown_profile_is_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let project = FakeProject::sleepers(&["dev"]);
    let registry = os_registry();
    let ctx = dev_context(&project, &registry, SecurityConfig::default());

    let err = dev_server::start_all(
        &ctx,
        &StartAllSelection::Profile("mobile".into()),
        dir.path(),
        false,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DevError::Validation(_)));
}

#[tokio::test]
async fn test_start_all_detect_without_common_scripts_fails() {
    let dir = tempfile::tempdir().unwrap();
    let project = FakeProject::sleepers(&["lint"]);
    let registry = os_registry();
    let ctx = dev_context(&project, &registry, SecurityConfig::default());

    let err = dev_server::start_all(&ctx, &StartAllSelection::Detect, dir.path(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, DevError::NoDevScript { .. }));
}

#[tokio::test]
async fn test_logs_for_running_and_unknown_scripts() {
    let dir = tempfile::tempdir().unwrap();
    let project = FakeProject::new(&[("dev", &["sh", "-c", "echo hello; sleep 30"])]);
    let registry = os_registry();
    let ctx = dev_context(&project, &registry, SecurityConfig::default());

    dev_server::start(&ctx, None, dir.path(), false).await.unwrap();
    let captured = eventually(Duration::from_secs(3), || async {
        dev_server::logs(&ctx, Some("dev"), dir.path(), 10)
            .await
            .is_ok_and(|entries| entries.iter().any(|(_, lines)| lines.iter().any(|l| l.line == "hello")))
    })
    .await;
    assert!(captured);

    let err = dev_server::logs(&ctx, Some("api"), dir.path(), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, DevError::NotRunning { .. }));
    registry.stop_all(None).await;
}
