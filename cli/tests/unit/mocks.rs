//! Shared mock infrastructure for unit tests.
//!
//! Hand-written port implementations so each test file doesn't have to
//! re-define the same boilerplate.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use devpilot_cli::application::ports::{
    CommandRunner, ExecOutput, ExecRequest, LaunchSpec, ProcessControl, ProcessLauncher,
    ProjectInspector, SecretWrapper,
};
use devpilot_cli::application::registry::ProcessRegistry;
use devpilot_cli::application::services::DevContext;
use devpilot_cli::domain::config::{RegistryConfig, SecurityConfig};
use devpilot_cli::domain::error::ExecError;
use devpilot_cli::infra::process::OsProcesses;
use devpilot_common::{OutputLine, StreamKind};
use tokio::sync::mpsc;

// ── Project ──────────────────────────────────────────────────────────────────

/// A project whose scripts map directly to command lines.
pub struct FakeProject {
    scripts: BTreeMap<String, Vec<String>>,
}

impl FakeProject {
    pub fn new(scripts: &[(&str, &[&str])]) -> Self {
        Self {
            scripts: scripts
                .iter()
                .map(|(name, cmd)| {
                    (
                        (*name).to_string(),
                        cmd.iter().map(|s| (*s).to_string()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Every named script runs `sleep 30`.
    pub fn sleepers(names: &[&str]) -> Self {
        let scripts: Vec<(&str, &[&str])> = names
            .iter()
            .map(|n| (*n, ["sleep", "30"].as_slice()))
            .collect();
        Self::new(&scripts)
    }
}

impl ProjectInspector for FakeProject {
    fn resolve_dir(&self, cwd: Option<&str>) -> Result<PathBuf> {
        match cwd {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => Ok(std::env::current_dir()?),
        }
    }

    fn read_scripts(&self, _dir: &Path) -> Result<BTreeMap<String, String>> {
        Ok(self
            .scripts
            .iter()
            .map(|(name, cmd)| (name.clone(), cmd.join(" ")))
            .collect())
    }

    fn script_command(&self, _dir: &Path, script: &str, extra: &[String]) -> Vec<String> {
        let mut command = self.scripts.get(script).cloned().unwrap_or_default();
        command.extend(extra.iter().cloned());
        command
    }
}

/// A project without a readable manifest.
pub struct BrokenProject;

impl ProjectInspector for BrokenProject {
    fn resolve_dir(&self, _cwd: Option<&str>) -> Result<PathBuf> {
        anyhow::bail!("no such directory")
    }

    fn read_scripts(&self, dir: &Path) -> Result<BTreeMap<String, String>> {
        anyhow::bail!("cannot read {}/package.json", dir.display())
    }

    fn script_command(&self, _dir: &Path, _script: &str, _extra: &[String]) -> Vec<String> {
        Vec::new()
    }
}

// ── Secrets ──────────────────────────────────────────────────────────────────

pub struct NoSecrets;

impl SecretWrapper for NoSecrets {
    fn wrap(&self, command: Vec<String>, _dir: &Path, _read_only: bool) -> Vec<String> {
        command
    }
}

// ── Command runner ───────────────────────────────────────────────────────────

/// Records every request and answers with a canned result.
pub struct RecordingRunner {
    pub requests: Mutex<Vec<ExecRequest>>,
    timeout: bool,
    output: ExecOutput,
}

impl RecordingRunner {
    pub fn ok(stdout: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            timeout: false,
            output: ExecOutput {
                exit_code: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
                duration: Duration::from_millis(5),
            },
        }
    }

    pub fn timing_out() -> Self {
        Self::timing_out_after("")
    }

    /// Times out after printing `stdout`.
    pub fn timing_out_after(stdout: &str) -> Self {
        Self {
            timeout: true,
            ..Self::ok(stdout)
        }
    }

    pub fn calls(&self) -> Vec<ExecRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn answer(&self, request: &ExecRequest) -> Result<ExecOutput, ExecError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.timeout {
            return Err(ExecError::Timeout {
                after: request.timeout,
                stdout: self.output.stdout.clone(),
                stderr: self.output.stderr.clone(),
            });
        }
        Ok(self.output.clone())
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, request: &ExecRequest) -> Result<ExecOutput, ExecError> {
        self.answer(request)
    }

    async fn run_streaming(
        &self,
        request: &ExecRequest,
        sink: mpsc::UnboundedSender<OutputLine>,
    ) -> Result<ExecOutput, ExecError> {
        let output = self.answer(request)?;
        for line in output.stdout.lines() {
            let _ = sink.send(OutputLine {
                stream: StreamKind::Stdout,
                line: line.to_string(),
            });
        }
        Ok(output)
    }
}

// ── Process backend ──────────────────────────────────────────────────────────

/// Real OS processes, but pids marked dead fail the liveness probe.
#[derive(Clone, Default)]
pub struct FlakyLiveness {
    dead: Arc<Mutex<HashSet<u32>>>,
    checks_left: Arc<Mutex<HashMap<u32, usize>>>,
}

impl FlakyLiveness {
    pub fn mark_dead(&self, pid: u32) {
        self.dead.lock().unwrap().insert(pid);
    }

    /// `pid` passes the next `checks` liveness checks, then counts as dead.
    pub fn dies_after(&self, pid: u32, checks: usize) {
        self.checks_left.lock().unwrap().insert(pid, checks);
    }

    fn liveness_budget_spent(&self, pid: u32) -> bool {
        let mut left = self.checks_left.lock().unwrap();
        match left.get_mut(&pid) {
            Some(0) => true,
            Some(n) => {
                *n -= 1;
                false
            }
            None => false,
        }
    }
}

impl ProcessLauncher for FlakyLiveness {
    fn launch(&self, spec: &LaunchSpec) -> Result<tokio::process::Child> {
        OsProcesses.launch(spec)
    }
}

impl ProcessControl for FlakyLiveness {
    fn is_alive(&self, pid: u32) -> bool {
        !self.dead.lock().unwrap().contains(&pid)
            && !self.liveness_budget_spent(pid)
            && OsProcesses.is_alive(pid)
    }

    fn terminate(&self, pid: u32) {
        OsProcesses.terminate(pid);
    }

    fn kill(&self, pid: u32) {
        OsProcesses.kill(pid);
    }
}

// ── Builders ─────────────────────────────────────────────────────────────────

/// Registry timings short enough for tests.
pub fn fast_config() -> RegistryConfig {
    RegistryConfig {
        stop_grace_ms: 1000,
        bulk_stop_grace_ms: 1000,
        restart_settle_ms: 50,
        start_all_delay_ms: 10,
        readiness_window_ms: 3000,
        output_buffer_lines: 50,
    }
}

pub fn os_registry() -> ProcessRegistry<OsProcesses> {
    ProcessRegistry::new(OsProcesses, fast_config())
}

pub fn dev_context<'a, P, B>(
    project: &'a P,
    registry: &'a ProcessRegistry<B>,
    security: SecurityConfig,
) -> DevContext<'a, P, NoSecrets, B> {
    DevContext {
        project,
        secrets: &NoSecrets,
        registry,
        security,
    }
}

pub fn read_only() -> SecurityConfig {
    SecurityConfig {
        read_only: true,
        ..SecurityConfig::default()
    }
}

/// Poll `cond` every 50 ms for up to `timeout`.
pub async fn eventually<F, Fut>(timeout: Duration, mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
