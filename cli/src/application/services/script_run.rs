//! Application service: one-shot manifest script runs.

use std::path::Path;
use std::time::Duration;

use devpilot_common::OutputLine;
use tokio::sync::mpsc;

use super::{read_scripts, script_command};
use crate::application::ports::{
    CommandRunner, ExecOutput, ExecRequest, ProjectInspector, SecretWrapper,
};
use crate::domain::config::SecurityConfig;
use crate::domain::error::DevError;
use crate::domain::guardrail::{clamp_timeout, evaluate_script};
use crate::domain::validate::{validate_args, validate_script_name};

/// Timeout for a script run when the caller does not give one.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);

/// A request to run `script` once.
#[derive(Debug, Clone, Default)]
pub struct ScriptRun {
    pub script: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
    pub confirm: bool,
}

/// A finished run and the command line that produced it.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub command: String,
    pub timeout: Duration,
    pub output: ExecOutput,
}

/// Validate, gate and build the executor request for a script run.
///
/// # Errors
///
/// Validation, not-found, policy and confirmation errors.
pub fn prepare_run(
    project: &impl ProjectInspector,
    secrets: &impl SecretWrapper,
    security: &SecurityConfig,
    run: &ScriptRun,
    dir: &Path,
) -> Result<ExecRequest, DevError> {
    let script = validate_script_name(&run.script)?;
    let declared = read_scripts(project, dir)?;
    if !declared.contains_key(&script) {
        return Err(DevError::ScriptNotFound {
            script,
            available: declared.into_keys().collect(),
        });
    }
    evaluate_script(&script, security).enforce(run.confirm)?;
    let args = validate_args(&run.args)?;
    let timeout = clamp_timeout(run.timeout.unwrap_or(DEFAULT_RUN_TIMEOUT), security);

    let command = script_command(project, secrets, dir, &script, &args);
    ExecRequest::from_command(&command, dir, timeout).ok_or_else(|| DevError::Spawn {
        script,
        message: "empty command".to_string(),
    })
}

/// Run a script to completion and capture its output.
///
/// # Errors
///
/// Everything [`prepare_run`] rejects, plus [`DevError::Timeout`].
pub async fn run_script(
    project: &impl ProjectInspector,
    secrets: &impl SecretWrapper,
    runner: &impl CommandRunner,
    security: &SecurityConfig,
    run: &ScriptRun,
    dir: &Path,
) -> Result<RunOutcome, DevError> {
    let request = prepare_run(project, secrets, security, run, dir)?;
    tracing::info!(command = %request.command_line(), timeout_secs = request.timeout.as_secs(), "running script");
    let output = runner.run(&request).await?;
    Ok(RunOutcome {
        command: request.command_line(),
        timeout: request.timeout,
        output,
    })
}

/// Like [`run_script`], forwarding output lines to `sink` as they arrive.
///
/// # Errors
///
/// Everything [`prepare_run`] rejects, plus [`DevError::Timeout`].
pub async fn run_script_streaming(
    project: &impl ProjectInspector,
    secrets: &impl SecretWrapper,
    runner: &impl CommandRunner,
    security: &SecurityConfig,
    run: &ScriptRun,
    dir: &Path,
    sink: mpsc::UnboundedSender<OutputLine>,
) -> Result<RunOutcome, DevError> {
    let request = prepare_run(project, secrets, security, run, dir)?;
    let output = runner.run_streaming(&request, sink).await?;
    Ok(RunOutcome {
        command: request.command_line(),
        timeout: request.timeout,
        output,
    })
}
