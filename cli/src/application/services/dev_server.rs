//! Application service: background dev-server lifecycle.
//!
//! start / status / stop / restart / start-all / logs over the process
//! registry. Every mutation passes the read-only gate first; starts also pass
//! script-name validation and the lifecycle-hook guardrail before anything is
//! spawned.

use std::collections::BTreeMap;
use std::path::Path;

use devpilot_common::{OutputLine, ProcessInfo, profile_scripts};

use super::{DevContext, read_scripts, script_command};
use crate::application::ports::{ProcessControl, ProcessLauncher, ProjectInspector, SecretWrapper};
use crate::application::registry::{StartOutcome, StopOutcome};
use crate::domain::error::{DevError, ValidationError};
use crate::domain::guardrail::{evaluate_script, evaluate_session_mutation};
use crate::domain::process::{
    COMMON_SERVER_SCRIPTS, DEV_SCRIPT_CANDIDATES, detect_common_scripts, detect_dev_script,
};
use crate::domain::validate::validate_script_name;

/// Lines returned by `devLogs` when the caller does not ask for a count.
pub const DEFAULT_LOG_LINES: usize = 50;

/// Per-script result of a multi-script operation.
#[derive(Debug)]
pub struct ScriptOutcome {
    pub script: String,
    pub result: Result<StartOutcome, DevError>,
}

/// Result of `devStop`.
#[derive(Debug)]
pub enum StopReport {
    One(StopOutcome),
    All(Vec<StopOutcome>),
}

/// How `devStartAll` picks its scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartAllSelection {
    Scripts(Vec<String>),
    Profile(String),
    Detect,
}

fn names(scripts: &BTreeMap<String, String>) -> Vec<String> {
    scripts.keys().cloned().collect()
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Pick the script to run: the requested one (validated and present in the
/// manifest) or the first dev-script candidate the manifest declares.
fn resolve_script(
    requested: Option<&str>,
    scripts: &BTreeMap<String, String>,
) -> Result<String, DevError> {
    match requested {
        Some(name) => {
            let name = validate_script_name(name)?;
            if scripts.contains_key(&name) {
                Ok(name)
            } else {
                Err(DevError::ScriptNotFound {
                    script: name,
                    available: names(scripts),
                })
            }
        }
        None => detect_dev_script(scripts)
            .map(str::to_string)
            .ok_or_else(|| DevError::NoDevScript {
                candidates: to_strings(DEV_SCRIPT_CANDIDATES),
                available: names(scripts),
            }),
    }
}

/// Resolve, gate and build the command for one script.
fn prepare<P, W, B>(
    ctx: &DevContext<'_, P, W, B>,
    requested: Option<&str>,
    dir: &Path,
    confirm: bool,
) -> Result<(String, Vec<String>), DevError>
where
    P: ProjectInspector,
    W: SecretWrapper,
{
    let scripts = read_scripts(ctx.project, dir)?;
    let script = resolve_script(requested, &scripts)?;
    evaluate_script(&script, &ctx.security).enforce(confirm)?;
    let command = script_command(ctx.project, ctx.secrets, dir, &script, &[]);
    Ok((script, command))
}

async fn start_in<P, W, B>(
    ctx: &DevContext<'_, P, W, B>,
    requested: Option<&str>,
    dir: &Path,
    confirm: bool,
) -> Result<StartOutcome, DevError>
where
    P: ProjectInspector,
    W: SecretWrapper,
    B: ProcessLauncher + ProcessControl,
{
    let (script, command) = prepare(ctx, requested, dir, confirm)?;
    ctx.registry.start(&script, dir, command).await
}

/// Start a dev server, auto-detecting the script when none is given.
///
/// # Errors
///
/// Validation, policy, confirmation, not-found and spawn errors.
pub async fn start<P, W, B>(
    ctx: &DevContext<'_, P, W, B>,
    script: Option<&str>,
    dir: &Path,
    confirm: bool,
) -> Result<StartOutcome, DevError>
where
    P: ProjectInspector,
    W: SecretWrapper,
    B: ProcessLauncher + ProcessControl,
{
    evaluate_session_mutation("devStart", &ctx.security).enforce(confirm)?;
    start_in(ctx, script, dir, confirm).await
}

/// Live servers in `dir`. An empty list is a normal outcome.
pub async fn status<P, W, B>(ctx: &DevContext<'_, P, W, B>, dir: &Path) -> Vec<ProcessInfo>
where
    B: ProcessLauncher + ProcessControl,
{
    ctx.registry.list(Some(dir)).await
}

/// Stop one script, or every server in `dir` when `script` is `None`.
///
/// # Errors
///
/// [`DevError::NotRunning`] for an unknown script; policy errors in read-only
/// mode.
pub async fn stop<P, W, B>(
    ctx: &DevContext<'_, P, W, B>,
    script: Option<&str>,
    dir: &Path,
) -> Result<StopReport, DevError>
where
    B: ProcessLauncher + ProcessControl,
{
    evaluate_session_mutation("devStop", &ctx.security).enforce(false)?;
    match script {
        Some(script) => {
            let script = validate_script_name(script)?;
            Ok(StopReport::One(ctx.registry.stop(&script, dir).await?))
        }
        None => Ok(StopReport::All(ctx.registry.stop_all(Some(dir)).await)),
    }
}

/// Restart one script, or every running server in `dir`.
///
/// A script that is not running is simply started. With no script and
/// nothing running this behaves like [`start`] with auto-detection.
///
/// # Errors
///
/// Errors that prevent any restart from being attempted; per-script failures
/// are reported in the outcomes.
pub async fn restart<P, W, B>(
    ctx: &DevContext<'_, P, W, B>,
    script: Option<&str>,
    dir: &Path,
    confirm: bool,
) -> Result<Vec<ScriptOutcome>, DevError>
where
    P: ProjectInspector,
    W: SecretWrapper,
    B: ProcessLauncher + ProcessControl,
{
    evaluate_session_mutation("devRestart", &ctx.security).enforce(confirm)?;
    let settle = ctx.registry.config().restart_settle();

    if let Some(requested) = script {
        // Gate before stopping so a refused start never leaves the server down.
        let (script, command) = prepare(ctx, Some(requested), dir, confirm)?;
        if ctx.registry.get(&script, dir).await.is_some() {
            // It may exit on its own before the stop; then there is nothing
            // to wait for.
            match ctx.registry.stop(&script, dir).await {
                Ok(_) => tokio::time::sleep(settle).await,
                Err(DevError::NotRunning { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        let result = ctx.registry.start(&script, dir, command).await;
        return Ok(vec![ScriptOutcome { script, result }]);
    }

    let running: Vec<String> = ctx
        .registry
        .list(Some(dir))
        .await
        .into_iter()
        .map(|p| p.script)
        .collect();
    if running.is_empty() {
        let outcome = start_in(ctx, None, dir, confirm).await?;
        return Ok(vec![ScriptOutcome {
            script: outcome.info().script.clone(),
            result: Ok(outcome),
        }]);
    }

    ctx.registry.stop_all(Some(dir)).await;
    tokio::time::sleep(settle).await;

    let mut outcomes = Vec::with_capacity(running.len());
    for script in running {
        let result = start_in(ctx, Some(&script), dir, confirm).await;
        outcomes.push(ScriptOutcome { script, result });
    }
    Ok(outcomes)
}

/// Start several scripts one after another.
///
/// # Errors
///
/// Errors that prevent the script list from being resolved; per-script
/// failures are reported in the outcomes.
pub async fn start_all<P, W, B>(
    ctx: &DevContext<'_, P, W, B>,
    selection: &StartAllSelection,
    dir: &Path,
    confirm: bool,
) -> Result<Vec<ScriptOutcome>, DevError>
where
    P: ProjectInspector,
    W: SecretWrapper,
    B: ProcessLauncher + ProcessControl,
{
    evaluate_session_mutation("devStartAll", &ctx.security).enforce(confirm)?;
    let declared = read_scripts(ctx.project, dir)?;

    let scripts = match selection {
        StartAllSelection::Scripts(list) if !list.is_empty() => list.clone(),
        StartAllSelection::Profile(name) => {
            let profile = profile_scripts(name)
                .map_err(|e| ValidationError::Other(e.to_string()))?;
            let present: Vec<String> = profile
                .iter()
                .filter(|s| declared.contains_key(**s))
                .map(|s| (*s).to_string())
                .collect();
            if present.is_empty() {
                return Err(DevError::NoDevScript {
                    candidates: to_strings(profile),
                    available: names(&declared),
                });
            }
            present
        }
        StartAllSelection::Scripts(_) | StartAllSelection::Detect => {
            let found = detect_common_scripts(&declared);
            if found.is_empty() {
                return Err(DevError::NoDevScript {
                    candidates: to_strings(COMMON_SERVER_SCRIPTS),
                    available: names(&declared),
                });
            }
            found
        }
    };

    let delay = ctx.registry.config().start_all_delay();
    let mut outcomes = Vec::with_capacity(scripts.len());
    for (i, script) in scripts.into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(delay).await;
        }
        let result = start_in(ctx, Some(&script), dir, confirm).await;
        outcomes.push(ScriptOutcome { script, result });
    }
    Ok(outcomes)
}

/// Recent output of one running script, or of every server in `dir`.
///
/// # Errors
///
/// [`DevError::NotRunning`] when a named script has no live record.
pub async fn logs<P, W, B>(
    ctx: &DevContext<'_, P, W, B>,
    script: Option<&str>,
    dir: &Path,
    lines: usize,
) -> Result<Vec<(ProcessInfo, Vec<OutputLine>)>, DevError>
where
    B: ProcessLauncher + ProcessControl,
{
    let targets = match script {
        Some(script) => {
            let script = validate_script_name(script)?;
            match ctx.registry.get(&script, dir).await {
                Some(info) => vec![info],
                None => {
                    return Err(DevError::NotRunning {
                        script,
                        running: ctx
                            .registry
                            .list(Some(dir))
                            .await
                            .into_iter()
                            .map(|p| p.script)
                            .collect(),
                    });
                }
            }
        }
        None => ctx.registry.list(Some(dir)).await,
    };

    let mut out = Vec::with_capacity(targets.len());
    for info in targets {
        // The process may exit between listing and reading; skip it then.
        if let Ok(lines) = ctx.registry.logs(&info.script, dir, lines).await {
            out.push((info, lines));
        }
    }
    Ok(out)
}
