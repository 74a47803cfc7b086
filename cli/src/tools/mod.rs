//! MCP tool adapter for the hosting agent.
//!
//! Exposes the dev-server lifecycle, metadata queries, one-shot script runs
//! and container commands via the `rmcp` `#[tool]` macro. Every tool returns
//! plain text; no error type crosses the tool boundary.

pub mod format;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::application::registry::ProcessRegistry;
use crate::application::services::container::{self, ContainerCommand};
use crate::application::services::dev_server::{self, DEFAULT_LOG_LINES, StartAllSelection};
use crate::application::services::query::run_query;
use crate::application::services::script_run::{self, ScriptRun};
use crate::application::services::{DevContext, resolve_dir};
use crate::domain::config::{DevpilotConfig, SecurityConfig};
use crate::domain::error::DevError;
use crate::domain::query::Value;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::process::OsProcesses;
use crate::infra::project::NodeProject;
use crate::infra::secrets::CliSecretWrapper;

use self::format::respond;

// ===================================================================
// Shared state
// ===================================================================

/// Everything the tools share for the life of the server.
pub struct ToolState {
    pub project: NodeProject,
    pub secrets: CliSecretWrapper,
    pub runner: TokioCommandRunner,
    pub registry: ProcessRegistry<OsProcesses>,
    pub security: SecurityConfig,
}

impl ToolState {
    #[must_use]
    pub fn new(config: &DevpilotConfig) -> Self {
        Self {
            project: NodeProject,
            secrets: CliSecretWrapper,
            runner: TokioCommandRunner::default(),
            registry: ProcessRegistry::new(OsProcesses, config.registry),
            security: config.security,
        }
    }

    fn dev(&self) -> DevContext<'_, NodeProject, CliSecretWrapper, OsProcesses> {
        DevContext {
            project: &self.project,
            secrets: &self.secrets,
            registry: &self.registry,
            security: self.security,
        }
    }

    fn dir(&self, cwd: Option<&str>) -> Result<PathBuf, DevError> {
        resolve_dir(&self.project, cwd)
    }
}

// ===================================================================
// Input structs
// ===================================================================

/// Input for `devStart`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevStartInput {
    /// Script to start. Auto-detected from dev, start, serve, develop when omitted.
    pub script: Option<String>,
    /// Project directory. Defaults to the server's working directory.
    pub cwd: Option<String>,
    /// Set to true to proceed after a confirmation request.
    #[serde(default)]
    pub confirm: bool,
}

/// Input for tools that only need a directory.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CwdInput {
    /// Project directory. Defaults to the server's working directory.
    pub cwd: Option<String>,
}

/// Input for `devStop`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevStopInput {
    /// Script to stop. Stops every server in the directory when omitted.
    pub script: Option<String>,
    /// Project directory. Defaults to the server's working directory.
    pub cwd: Option<String>,
}

/// Input for `devStartAll`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevStartAllInput {
    /// Explicit scripts to start, in order.
    pub scripts: Option<Vec<String>>,
    /// Named profile: web, api, fullstack or workers.
    pub profile: Option<String>,
    /// Project directory. Defaults to the server's working directory.
    pub cwd: Option<String>,
    /// Set to true to proceed after a confirmation request.
    #[serde(default)]
    pub confirm: bool,
}

/// Input for `devQuery`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevQueryInput {
    /// Query against the `processes` table, e.g.
    /// `SELECT script, pid FROM processes WHERE ready = true`.
    pub query: String,
    /// Values for `?` placeholders, in order.
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
    /// Restrict the query to one project directory. All rows when omitted.
    pub cwd: Option<String>,
}

/// Input for `devLogs`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevLogsInput {
    /// Script whose output to show. Every server in the directory when omitted.
    pub script: Option<String>,
    /// Number of most recent lines per server.
    pub lines: Option<usize>,
    /// Project directory. Defaults to the server's working directory.
    pub cwd: Option<String>,
}

/// Input for `devRun`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevRunInput {
    /// Script to run to completion.
    pub script: String,
    /// Extra arguments forwarded to the script.
    #[serde(default)]
    pub args: Vec<String>,
    /// Timeout in seconds (default 300, capped by configuration).
    pub timeout_secs: Option<u64>,
    /// Set to true to proceed after a confirmation request.
    #[serde(default)]
    pub confirm: bool,
    /// Project directory. Defaults to the server's working directory.
    pub cwd: Option<String>,
}

/// Input for `docker`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DockerInput {
    /// Docker subcommand, e.g. ps, logs, build, run.
    pub action: String,
    /// Additional arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Container name, appended as the target (or `--name` for run).
    pub container: Option<String>,
    /// Image reference, appended last.
    pub image: Option<String>,
    /// Timeout in seconds (action-specific default, capped by configuration).
    pub timeout_secs: Option<u64>,
    /// Set to true to proceed after a confirmation request.
    #[serde(default)]
    pub confirm: bool,
    /// Directory to run in. Defaults to the server's working directory.
    pub cwd: Option<String>,
}

/// Convert a JSON query parameter to a query value.
fn query_param(value: &serde_json::Value) -> Result<Value, DevError> {
    match value {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| DevError::Query(format!("parameter {n} is not an integer"))),
        other => Err(DevError::Query(format!(
            "parameter {other} must be a string, integer, boolean or null"
        ))),
    }
}

// ===================================================================
// DevTools: the MCP server handler
// ===================================================================

/// MCP server handler exposing the dev-server tools.
#[derive(Clone)]
pub struct DevTools {
    state: Arc<ToolState>,
    tool_router: ToolRouter<Self>,
}

impl std::fmt::Debug for DevTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevTools")
            .field("state", &"<ToolState>")
            .finish()
    }
}

impl DevTools {
    pub fn new(state: Arc<ToolState>) -> Self {
        Self {
            state,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl DevTools {
    #[tool(
        name = "devStart",
        description = "Start a development server in the background. Auto-detects \
            the script (dev, start, serve, develop) when none is given. Returns \
            immediately with the PID; a second start of the same script reports \
            that it is already running."
    )]
    async fn dev_start(&self, params: Parameters<DevStartInput>) -> Result<String, String> {
        let input = params.0;
        let state = &self.state;
        let result = async {
            let dir = state.dir(input.cwd.as_deref())?;
            dev_server::start(&state.dev(), input.script.as_deref(), &dir, input.confirm).await
        }
        .await;
        respond(result, |outcome| format::start_outcome(&outcome))
    }

    #[tool(
        name = "devStatus",
        description = "List the background development servers running in a \
            directory with PID, uptime, readiness and command."
    )]
    async fn dev_status(&self, params: Parameters<CwdInput>) -> Result<String, String> {
        let state = &self.state;
        let result = async {
            let dir = state.dir(params.0.cwd.as_deref())?;
            let servers = dev_server::status(&state.dev(), &dir).await;
            Ok::<_, DevError>((dir, servers))
        }
        .await;
        respond(result, |(dir, servers)| format::status(&dir, &servers))
    }

    #[tool(
        name = "devStop",
        description = "Stop a background development server (graceful, then \
            forced). Stops every server in the directory when no script is given."
    )]
    async fn dev_stop(&self, params: Parameters<DevStopInput>) -> Result<String, String> {
        let input = params.0;
        let state = &self.state;
        let result = async {
            let dir = state.dir(input.cwd.as_deref())?;
            let report = dev_server::stop(&state.dev(), input.script.as_deref(), &dir).await?;
            Ok::<_, DevError>((dir, report))
        }
        .await;
        respond(result, |(dir, report)| format::stop_report(&dir, &report))
    }

    #[tool(
        name = "devRestart",
        description = "Restart a background development server, or every running \
            server in the directory when no script is given. A script that is not \
            running is started."
    )]
    async fn dev_restart(&self, params: Parameters<DevStartInput>) -> Result<String, String> {
        let input = params.0;
        let state = &self.state;
        let result = async {
            let dir = state.dir(input.cwd.as_deref())?;
            dev_server::restart(&state.dev(), input.script.as_deref(), &dir, input.confirm).await
        }
        .await;
        respond(result, |outcomes| format::script_outcomes("Restarted", &outcomes))
    }

    #[tool(
        name = "devStartAll",
        description = "Start several development servers one after another: an \
            explicit list, a named profile (web, api, fullstack, workers), or the \
            common server scripts the project declares."
    )]
    async fn dev_start_all(&self, params: Parameters<DevStartAllInput>) -> Result<String, String> {
        let input = params.0;
        let state = &self.state;
        let selection = match (input.scripts, input.profile) {
            (Some(scripts), _) if !scripts.is_empty() => StartAllSelection::Scripts(scripts),
            (_, Some(profile)) => StartAllSelection::Profile(profile),
            _ => StartAllSelection::Detect,
        };
        let result = async {
            let dir = state.dir(input.cwd.as_deref())?;
            dev_server::start_all(&state.dev(), &selection, &dir, input.confirm).await
        }
        .await;
        respond(result, |outcomes| format::script_outcomes("Started", &outcomes))
    }

    #[tool(
        name = "devQuery",
        description = "Query background process metadata with SQL-like syntax over \
            the `processes` table (columns: key, script, cwd, pid, started_at, \
            uptime_secs, command, ready, label). Supports SELECT with WHERE, \
            ORDER BY, LIMIT and COUNT(*), and UPDATE processes SET label = ..."
    )]
    async fn dev_query(&self, params: Parameters<DevQueryInput>) -> Result<String, String> {
        let input = params.0;
        let state = &self.state;
        let result = async {
            let values = input
                .params
                .iter()
                .map(query_param)
                .collect::<Result<Vec<_>, _>>()?;
            let dir = match input.cwd.as_deref() {
                Some(cwd) => Some(state.dir(Some(cwd))?),
                None => None,
            };
            run_query(
                &state.registry,
                &state.security,
                &input.query,
                &values,
                dir.as_deref(),
            )
            .await
        }
        .await;
        respond(result, |outcome| format::query_outcome(&outcome))
    }

    #[tool(
        name = "devLogs",
        description = "Show the most recent output lines captured from background \
            development servers."
    )]
    async fn dev_logs(&self, params: Parameters<DevLogsInput>) -> Result<String, String> {
        let input = params.0;
        let state = &self.state;
        let limit = state.registry.config().output_buffer_lines;
        let lines = input.lines.unwrap_or(DEFAULT_LOG_LINES).clamp(1, limit.max(1));
        let result = async {
            let dir = state.dir(input.cwd.as_deref())?;
            let entries =
                dev_server::logs(&state.dev(), input.script.as_deref(), &dir, lines).await?;
            Ok::<_, DevError>((dir, entries))
        }
        .await;
        respond(result, |(dir, entries)| format::logs(&dir, &entries))
    }

    #[tool(
        name = "devRun",
        description = "Run a package script to completion and return its exit code \
            and output. Use devStart for long-running servers."
    )]
    async fn dev_run(&self, params: Parameters<DevRunInput>) -> Result<String, String> {
        let input = params.0;
        let state = &self.state;
        let run = ScriptRun {
            script: input.script,
            args: input.args,
            timeout: input.timeout_secs.map(Duration::from_secs),
            confirm: input.confirm,
        };
        let result = async {
            let dir = state.dir(input.cwd.as_deref())?;
            script_run::run_script(
                &state.project,
                &state.secrets,
                &state.runner,
                &state.security,
                &run,
                &dir,
            )
            .await
        }
        .await;
        respond(result, |outcome| format::run_outcome(&outcome))
    }

    #[tool(
        name = "docker",
        description = "Run a docker command with validation and guardrails. \
            Destructive and privileged actions require confirm: true; host \
            networking, privileged containers and sensitive mounts are refused."
    )]
    async fn docker(&self, params: Parameters<DockerInput>) -> Result<String, String> {
        let input = params.0;
        let state = &self.state;
        let cmd = ContainerCommand {
            action: input.action,
            args: input.args,
            container: input.container,
            image: input.image,
            timeout: input.timeout_secs.map(Duration::from_secs),
            confirm: input.confirm,
        };
        let result = async {
            let dir = state.dir(input.cwd.as_deref())?;
            container::run_container(&state.secrets, &state.runner, &state.security, &cmd, &dir)
                .await
        }
        .await;
        respond(result, |outcome| format::run_outcome(&outcome))
    }
}

// -------------------------------------------------------------------
// ServerHandler implementation (via tool_handler macro)
// -------------------------------------------------------------------

#[tool_handler]
impl ServerHandler for DevTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "devpilot: background dev servers and guarded commands. \
                 Use devStart/devStatus/devStop for long-running servers, \
                 devRun for one-shot scripts and docker for container commands. \
                 A response starting with 'Confirmation required' means the call \
                 must be repeated with confirm: true."
                    .into(),
            ),
            ..Default::default()
        }
    }
}
