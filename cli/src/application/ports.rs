//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and the shared types crate;
//! never from `crate::infra`, `crate::commands`, or `crate::tools`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use devpilot_common::OutputLine;
use tokio::sync::mpsc;

use crate::domain::config::DevpilotConfig;
use crate::domain::error::ExecError;

// ── Value Types ───────────────────────────────────────────────────────────────

/// A one-shot command to run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

impl ExecRequest {
    /// Build a request from a full command line (`program` followed by args).
    /// Returns `None` for an empty command.
    #[must_use]
    pub fn from_command(command: &[String], cwd: &Path, timeout: Duration) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            cwd: cwd.to_path_buf(),
            timeout,
        })
    }

    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a command that ran to completion.
///
/// A command that could not be spawned at all is reported with
/// [`SPAWN_FAILED_EXIT_CODE`] and the OS error in `stderr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// Exit code reported when the OS refused to create the process.
pub const SPAWN_FAILED_EXIT_CODE: i32 = -1;

impl ExecOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    #[must_use]
    pub fn spawn_failed(message: impl Into<String>) -> Self {
        Self {
            exit_code: SPAWN_FAILED_EXIT_CODE,
            stdout: String::new(),
            stderr: message.into(),
            duration: Duration::ZERO,
        }
    }
}

/// A background process to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts one-shot process execution so infrastructure can be swapped or
/// mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a command to completion and capture its output.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Timeout`] when the command exceeds its timeout.
    /// The child must be terminated (not left orphaned) in that case.
    async fn run(&self, request: &ExecRequest) -> Result<ExecOutput, ExecError>;

    /// Like [`run`](Self::run), additionally forwarding every output line to
    /// `sink` as it is read.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Timeout`] when the command exceeds its timeout.
    async fn run_streaming(
        &self,
        request: &ExecRequest,
        sink: mpsc::UnboundedSender<OutputLine>,
    ) -> Result<ExecOutput, ExecError>;
}

// ── Background Process Ports ──────────────────────────────────────────────────

/// Spawns long-running background processes with piped output.
pub trait ProcessLauncher: Send + Sync + 'static {
    /// Spawn `spec` non-interactively (stdin closed, stdout/stderr piped).
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to create the process.
    fn launch(&self, spec: &LaunchSpec) -> Result<tokio::process::Child>;
}

/// Signals and probes OS processes by pid.
pub trait ProcessControl: Send + Sync + 'static {
    /// Zero-effect existence probe. Any probe failure counts as dead.
    fn is_alive(&self, pid: u32) -> bool;
    /// Ask the process (and its group) to exit.
    fn terminate(&self, pid: u32);
    /// Forcefully kill the process (and its group).
    fn kill(&self, pid: u32);
}

// ── Project Ports ─────────────────────────────────────────────────────────────

/// Reads a project's manifest and builds script invocations.
pub trait ProjectInspector {
    /// Resolve the caller's working directory (or the process cwd when
    /// absent) to an absolute directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist or is not a directory.
    fn resolve_dir(&self, cwd: Option<&str>) -> Result<PathBuf>;

    /// The manifest's declared script map.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is missing or unparseable.
    fn read_scripts(&self, dir: &Path) -> Result<BTreeMap<String, String>>;

    /// Full command line that runs `script` with `extra` forwarded to it.
    fn script_command(&self, dir: &Path, script: &str, extra: &[String]) -> Vec<String>;
}

/// Prefixes commands with a secrets-injection CLI when the project is set
/// up for one.
pub trait SecretWrapper {
    /// Return `command` unchanged, or prefixed with the secrets CLI.
    /// `read_only` actions are never wrapped.
    fn wrap(&self, command: Vec<String>, dir: &Path, read_only: bool) -> Vec<String>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts configuration persistence.
pub trait ConfigStore {
    /// Load the configuration, falling back to defaults when none is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored file cannot be read or parsed.
    fn load(&self) -> Result<DevpilotConfig>;

    /// Persist `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save(&self, config: &DevpilotConfig) -> Result<()>;

    /// Location of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    fn path(&self) -> Result<PathBuf>;
}
