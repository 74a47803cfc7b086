//! `devpilot check`: run the command validator on input from the shell.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;

use crate::app::AppContext;
use crate::domain::error::ValidationError;
use crate::domain::validate::{
    MAX_ARG_LENGTH, validate_args, validate_argument, validate_container_args,
    validate_container_name, validate_image_name, validate_path, validate_script_name,
};
use crate::output::json;

/// What kind of input to validate.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckKind {
    /// Each value as a single argument
    Arg,
    /// All values as one argument list
    Args,
    /// A filesystem path
    Path,
    /// A package script name
    Script,
    /// A container name
    Container,
    /// All values as one container argument list
    ContainerArgs,
    /// An image reference
    Image,
}

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Validator to apply
    #[arg(value_enum)]
    pub kind: CheckKind,

    /// Values to validate
    #[arg(required = true, allow_hyphen_values = true)]
    pub values: Vec<String>,
}

#[derive(Serialize)]
struct CheckReport {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    normalized: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn each(
    values: &[String],
    f: impl Fn(&str) -> Result<String, ValidationError>,
) -> Result<Vec<String>, ValidationError> {
    values.iter().map(|v| f(v)).collect()
}

/// Apply the validator for `kind`, returning the normalized values.
///
/// # Errors
///
/// The first validation failure.
pub fn check(kind: CheckKind, values: &[String]) -> Result<Vec<String>, ValidationError> {
    match kind {
        CheckKind::Arg => each(values, |v| validate_argument(v, MAX_ARG_LENGTH)),
        CheckKind::Args => validate_args(values),
        CheckKind::Path => each(values, validate_path),
        CheckKind::Script => each(values, validate_script_name),
        CheckKind::Container => each(values, validate_container_name),
        CheckKind::ContainerArgs => validate_container_args(values),
        CheckKind::Image => each(values, validate_image_name),
    }
}

/// Run the check command. Exits non-zero when validation fails.
///
/// # Errors
///
/// Returns an error only if JSON output cannot be produced.
pub fn run(app: &AppContext, args: &CheckArgs) -> Result<ExitCode> {
    let result = check(args.kind, &args.values);
    let code = if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    };

    if app.is_json() {
        let report = match result {
            Ok(values) => CheckReport {
                valid: true,
                normalized: Some(values),
                error: None,
            },
            Err(e) => CheckReport {
                valid: false,
                normalized: None,
                error: Some(e.to_string()),
            },
        };
        json::print(&report)?;
        return Ok(code);
    }

    match result {
        Ok(values) => {
            for value in values {
                app.output.success(&format!("valid: {value}"));
            }
        }
        Err(e) => app.output.error(&format!("Validation failed: {e}")),
    }
    Ok(code)
}
