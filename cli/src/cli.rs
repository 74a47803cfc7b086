//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, OutputFlags, PolicyFlags};
use crate::commands;

/// Background dev servers and guarded commands for AI coding agents
#[derive(Parser)]
#[command(
    name = "devpilot",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(flatten)]
    pub policy: PolicyFlags,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the dev tools over MCP on stdio
    Serve,

    /// Run a package script to completion, streaming its output
    Run(commands::run::RunArgs),

    /// Validate input the way the tools do
    Check(commands::check::CheckArgs),

    /// Show the guardrail decision for a docker command
    Guard(commands::guard::GuardArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            policy,
            command,
        } = self;

        if let Command::Version = command {
            commands::version::run(json);
            return Ok(ExitCode::SUCCESS);
        }

        let app = AppContext::new(
            &OutputFlags {
                no_color,
                quiet,
                json,
            },
            &policy,
        )?;

        match command {
            Command::Serve => commands::serve::run(&app).await,
            Command::Run(args) => commands::run::run(&app, args).await,
            Command::Check(args) => commands::check::run(&app, &args),
            Command::Guard(args) => commands::guard::run(&app, args),
            Command::Config(cmd) => commands::config::run(&app, cmd),
            Command::Version => Ok(ExitCode::SUCCESS),
        }
    }
}
