//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::time::Duration;

use thiserror::Error;

use crate::domain::query::QueryError;

// ── Validation errors ─────────────────────────────────────────────────────────

/// Why a user-supplied string was rejected by the command validator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{what} must be a non-empty string")]
    Empty { what: &'static str },

    #[error("{what} exceeds maximum length of {max} characters")]
    TooLong { what: &'static str, max: usize },

    #[error("Argument contains dangerous character '{0}'")]
    DangerousCharacter(String),

    #[error("Argument matches injection pattern: {0}")]
    InjectionPattern(&'static str),

    #[error("Too many arguments: {count} (maximum {max})")]
    TooManyArguments { count: usize, max: usize },

    #[error("Argument {index}: {source}")]
    InArgument {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("Path contains null bytes")]
    NullByte,

    #[error("Path traversal is not allowed: {0}")]
    PathTraversal(String),

    #[error("Access to system path is not allowed: {0}")]
    SensitivePath(String),

    #[error("Invalid {what} '{value}': {rule}")]
    InvalidName {
        what: &'static str,
        value: String,
        rule: &'static str,
    },

    #[error("Flag '{0}' is not allowed")]
    ForbiddenFlag(String),

    #[error("Volume mount '{mount}': {source}")]
    InVolume {
        mount: String,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("{0}")]
    Other(String),
}

// ── Dev-server / tool errors ──────────────────────────────────────────────────

/// Errors surfaced at the tool boundary. Each variant renders as the plain
/// text the caller sees.
#[derive(Debug, Error)]
pub enum DevError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Security: {0}")]
    Policy(String),

    #[error("Confirmation required: {0}. Re-run with confirm: true to proceed.")]
    ConfirmationRequired(String),

    #[error("Script '{script}' not found. Available scripts: {}", list_or_none(.available))]
    ScriptNotFound {
        script: String,
        available: Vec<String>,
    },

    #[error("No dev script found (looked for {}). Available scripts: {}", .candidates.join(", "), list_or_none(.available))]
    NoDevScript {
        candidates: Vec<String>,
        available: Vec<String>,
    },

    #[error("Script '{script}' is not running. Running scripts: {}", list_or_none(.running))]
    NotRunning {
        script: String,
        running: Vec<String>,
    },

    #[error("Failed to start '{script}': {message}")]
    Spawn { script: String, message: String },

    /// The output captured before the command was killed travels with the
    /// error.
    #[error("Command timed out after {}", span(.after))]
    Timeout {
        after: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("Project error: {0}")]
    Project(String),

    #[error("Query error: {0}")]
    Query(String),
}

/// A one-shot command that did not finish. A non-zero exit is not an error;
/// it is reported through the exit code.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Command timed out after {}", span(.after))]
    Timeout {
        after: Duration,
        stdout: String,
        stderr: String,
    },
}

impl From<ExecError> for DevError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Timeout {
                after,
                stdout,
                stderr,
            } => Self::Timeout {
                after,
                stdout,
                stderr,
            },
        }
    }
}

impl From<QueryError> for DevError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Forbidden(_) => Self::Policy(err.to_string()),
            QueryError::ReadOnlyColumn(_) => Self::Validation(ValidationError::Other(err.to_string())),
            QueryError::Parse(msg) => Self::Query(msg),
        }
    }
}

/// `300s`, `1.5s` or `200ms`.
fn span(d: &Duration) -> String {
    if d.as_secs() == 0 {
        format!("{}ms", d.as_millis())
    } else if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },
}
