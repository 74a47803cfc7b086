//! `devpilot serve`: MCP server over stdio.
//!
//! stdout carries the protocol, so logging goes to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::ServiceExt;
use tracing_subscriber::EnvFilter;

use crate::app::AppContext;
use crate::tools::{DevTools, ToolState};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

/// Serve until the client disconnects, then stop every background server.
///
/// # Errors
///
/// Returns an error if the transport cannot be set up or fails.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    init_tracing();
    let security = app.config.security;
    tracing::info!(
        read_only = security.read_only,
        block_dangerous = security.block_dangerous,
        require_confirmation = security.require_confirmation,
        max_timeout_secs = security.max_timeout_secs,
        "devpilot MCP server starting"
    );

    let state = Arc::new(ToolState::new(&app.config));
    let service = DevTools::new(Arc::clone(&state))
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start MCP server")?;
    let served = service.waiting().await;

    let stopped = state.registry.stop_all(None).await;
    if !stopped.is_empty() {
        tracing::info!(count = stopped.len(), "stopped background servers on shutdown");
    }
    served.context("MCP server terminated abnormally")?;
    Ok(ExitCode::SUCCESS)
}
