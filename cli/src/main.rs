//! devpilot - background dev servers and guarded commands for AI coding agents

use std::process::ExitCode;

use clap::Parser;
use devpilot_cli::cli::Cli;
use devpilot_cli::output::json;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let as_json = cli.json;
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            match json::format_error(&format!("{e:#}"), "error") {
                Ok(text) if as_json => println!("{text}"),
                _ => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
