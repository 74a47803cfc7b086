//! Application service: one-shot container commands.
//!
//! Arguments go through the container validator, then the operation, mount
//! and network guardrails; the most severe decision wins.

use std::path::Path;
use std::time::Duration;

use super::script_run::RunOutcome;
use crate::application::ports::{CommandRunner, ExecRequest, SecretWrapper};
use crate::domain::config::SecurityConfig;
use crate::domain::error::{DevError, ValidationError};
use crate::domain::guardrail::{
    GuardrailDecision, clamp_timeout, evaluate_network_settings, evaluate_operation,
    evaluate_volume_mounts,
};
use crate::domain::validate::{
    MAX_ARG_LENGTH, validate_argument, validate_container_args, validate_container_name,
    validate_image_name,
};

pub const CONTAINER_PROGRAM: &str = "docker";

/// Actions that only inspect state. They get a short timeout and are never
/// secret-wrapped.
pub const INSPECTION_ACTIONS: &[&str] =
    &["ps", "logs", "inspect", "images", "version", "info", "top", "stats"];

/// Actions that move images over the network or build them.
pub const LONG_RUNNING_ACTIONS: &[&str] = &["build", "pull", "push"];

/// A request to run one container command.
#[derive(Debug, Clone, Default)]
pub struct ContainerCommand {
    pub action: String,
    pub args: Vec<String>,
    pub container: Option<String>,
    pub image: Option<String>,
    pub timeout: Option<Duration>,
    pub confirm: bool,
}

/// Timeout used when the caller does not give one.
#[must_use]
pub fn default_timeout(action: &str) -> Duration {
    if INSPECTION_ACTIONS.contains(&action) {
        Duration::from_secs(30)
    } else if LONG_RUNNING_ACTIONS.contains(&action) {
        Duration::from_secs(600)
    } else {
        Duration::from_secs(120)
    }
}

fn validate_action(raw: &str) -> Result<String, ValidationError> {
    let action = validate_argument(raw, MAX_ARG_LENGTH)?;
    if action.starts_with('-')
        || !action
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError::InvalidName {
            what: "action",
            value: action,
            rule: "lowercase letters, digits and '-' only",
        });
    }
    Ok(action)
}

/// Validate and gate `cmd`, returning the command line to run.
///
/// # Errors
///
/// Validation, policy and confirmation errors.
pub fn build_command(
    cmd: &ContainerCommand,
    security: &SecurityConfig,
) -> Result<Vec<String>, DevError> {
    let action = validate_action(&cmd.action)?;
    let args = validate_container_args(&cmd.args)?;
    let container = cmd
        .container
        .as_deref()
        .map(validate_container_name)
        .transpose()?;
    let image = cmd.image.as_deref().map(validate_image_name).transpose()?;

    evaluate_operation(&action, &args, security)
        .most_severe(evaluate_volume_mounts(&args))
        .most_severe(evaluate_network_settings(&args))
        .enforce(cmd.confirm)?;

    let mut command = vec![CONTAINER_PROGRAM.to_string(), action.clone()];
    command.extend(args);
    if let Some(container) = container {
        if action == "run" || action == "create" {
            command.push("--name".to_string());
        }
        command.push(container);
    }
    if let Some(image) = image {
        command.push(image);
    }
    Ok(command)
}

/// Gate decision for `cmd` without running it.
///
/// # Errors
///
/// Validation errors for malformed input.
pub fn evaluate(
    cmd: &ContainerCommand,
    security: &SecurityConfig,
) -> Result<GuardrailDecision, DevError> {
    let action = validate_action(&cmd.action)?;
    let args = validate_container_args(&cmd.args)?;
    Ok(evaluate_operation(&action, &args, security)
        .most_severe(evaluate_volume_mounts(&args))
        .most_severe(evaluate_network_settings(&args)))
}

/// Run a container command to completion.
///
/// # Errors
///
/// Everything [`build_command`] rejects, plus [`DevError::Timeout`].
pub async fn run_container(
    secrets: &impl SecretWrapper,
    runner: &impl CommandRunner,
    security: &SecurityConfig,
    cmd: &ContainerCommand,
    dir: &Path,
) -> Result<RunOutcome, DevError> {
    let command = build_command(cmd, security)?;
    let read_only = INSPECTION_ACTIONS.contains(&cmd.action.as_str());
    let command = secrets.wrap(command, dir, read_only);
    let timeout = clamp_timeout(
        cmd.timeout.unwrap_or_else(|| default_timeout(&cmd.action)),
        security,
    );
    let request = ExecRequest::from_command(&command, dir, timeout).ok_or_else(|| {
        DevError::Spawn {
            script: cmd.action.clone(),
            message: "empty command".to_string(),
        }
    })?;

    tracing::info!(command = %request.command_line(), timeout_secs = timeout.as_secs(), "running container command");
    let output = runner.run(&request).await?;
    Ok(RunOutcome {
        command: request.command_line(),
        timeout,
        output,
    })
}
