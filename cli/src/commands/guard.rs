//! `devpilot guard`: show the guardrail decision for a docker command
//! without running it.
//!
//! Exit status: 0 allowed, 2 confirmation required, 3 blocked, 1 invalid
//! input.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::application::services::container::{self, ContainerCommand};
use crate::domain::guardrail::GuardrailDecision;
use crate::output::json;

/// Arguments for the guard command.
#[derive(Args, Debug)]
pub struct GuardArgs {
    /// Docker subcommand, e.g. run, rm, build
    pub action: String,

    /// Arguments to the subcommand
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Serialize)]
struct GuardReport<'a> {
    decision: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

fn describe(decision: &GuardrailDecision) -> (&'static str, Option<&str>, u8) {
    match decision {
        GuardrailDecision::Allowed => ("allowed", None, 0),
        GuardrailDecision::ConfirmationRequired(reason) => {
            ("confirmation_required", Some(reason), 2)
        }
        GuardrailDecision::Blocked(reason) => ("blocked", Some(reason), 3),
    }
}

/// Run the guard command.
///
/// # Errors
///
/// Validation errors for malformed input.
pub fn run(app: &AppContext, args: GuardArgs) -> Result<ExitCode> {
    let cmd = ContainerCommand {
        action: args.action,
        args: args.args,
        ..ContainerCommand::default()
    };
    let decision = container::evaluate(&cmd, &app.config.security)?;
    let (label, reason, code) = describe(&decision);

    if app.is_json() {
        json::print(&GuardReport {
            decision: label,
            reason,
        })?;
    } else {
        match &decision {
            GuardrailDecision::Allowed => app.output.success(&format!("{} is allowed", cmd.action)),
            GuardrailDecision::ConfirmationRequired(reason) => app
                .output
                .warn(&format!("Confirmation required: {reason}")),
            GuardrailDecision::Blocked(reason) => app.output.error(&format!("Blocked: {reason}")),
        }
    }
    Ok(ExitCode::from(code))
}
