//! `devpilot run`: one-shot script run with live output.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use devpilot_common::{OutputLine, StreamKind};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::app::AppContext;
use crate::application::services::resolve_dir;
use crate::application::services::script_run::{self, RunOutcome, ScriptRun};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::project::NodeProject;
use crate::infra::secrets::CliSecretWrapper;
use crate::output::json;

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Script declared in package.json
    pub script: String,

    /// Timeout in seconds (default 300, capped by --max-timeout)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Proceed with scripts that need confirmation
    #[arg(long)]
    pub confirm: bool,

    /// Project directory (defaults to the current directory)
    #[arg(long)]
    pub cwd: Option<String>,

    /// Arguments forwarded to the script
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(Serialize)]
struct RunReport<'a> {
    command: &'a str,
    exit_code: i32,
    duration_ms: u128,
    stdout: &'a str,
    stderr: &'a str,
}

/// Map a child exit code to this process's exit code.
fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}

/// Run the script, echoing its output as it arrives (or as one JSON object
/// with `--json`), and exit with its exit code.
///
/// # Errors
///
/// Validation, policy, confirmation and timeout errors.
pub async fn run(app: &AppContext, args: RunArgs) -> Result<ExitCode> {
    let project = NodeProject;
    let secrets = CliSecretWrapper;
    let runner = TokioCommandRunner::default();
    let security = app.config.security;
    let dir = resolve_dir(&project, args.cwd.as_deref())?;
    let request = ScriptRun {
        script: args.script,
        args: args.args,
        timeout: args.timeout.map(Duration::from_secs),
        confirm: args.confirm,
    };

    if app.is_json() {
        let outcome =
            script_run::run_script(&project, &secrets, &runner, &security, &request, &dir).await?;
        print_report(&outcome)?;
        return Ok(exit_code(outcome.output.exit_code));
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            match line.stream {
                StreamKind::Stdout => println!("{}", line.line),
                StreamKind::Stderr => eprintln!("{}", line.line),
            }
        }
    });
    let result = script_run::run_script_streaming(
        &project, &secrets, &runner, &security, &request, &dir, tx,
    )
    .await;
    let _ = printer.await;
    let outcome = result?;

    let code = outcome.output.exit_code;
    let summary = format!(
        "{} exited with {code} in {:.1}s",
        outcome.command,
        outcome.output.duration.as_secs_f64()
    );
    app.output.finished(&summary, outcome.output.success());
    Ok(exit_code(code))
}

fn print_report(outcome: &RunOutcome) -> Result<()> {
    json::print(&RunReport {
        command: &outcome.command,
        exit_code: outcome.output.exit_code,
        duration_ms: outcome.output.duration.as_millis(),
        stdout: &outcome.output.stdout,
        stderr: &outcome.output.stderr,
    })
}
