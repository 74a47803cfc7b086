//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain`,
//! `crate::application::ports` and the registry; never from `crate::infra`,
//! `crate::commands`, or `crate::tools`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::application::ports::{ProjectInspector, SecretWrapper};
use crate::application::registry::ProcessRegistry;
use crate::domain::config::SecurityConfig;
use crate::domain::error::DevError;

pub mod config_service;
pub mod container;
pub mod dev_server;
pub mod query;
pub mod script_run;

/// Collaborators shared by the dev-server use-cases.
pub struct DevContext<'a, P, W, B> {
    pub project: &'a P,
    pub secrets: &'a W,
    pub registry: &'a ProcessRegistry<B>,
    pub security: SecurityConfig,
}

/// Resolve the caller's working directory.
///
/// # Errors
///
/// Returns [`DevError::Project`] if the directory does not exist.
pub fn resolve_dir(project: &impl ProjectInspector, cwd: Option<&str>) -> Result<PathBuf, DevError> {
    project
        .resolve_dir(cwd)
        .map_err(|e| DevError::Project(format!("{e:#}")))
}

/// Build the command for `script` and apply secret wrapping.
fn script_command(
    project: &impl ProjectInspector,
    secrets: &impl SecretWrapper,
    dir: &Path,
    script: &str,
    extra: &[String],
) -> Vec<String> {
    let command = project.script_command(dir, script, extra);
    secrets.wrap(command, dir, false)
}

/// The project's declared scripts.
fn read_scripts(
    project: &impl ProjectInspector,
    dir: &Path,
) -> Result<BTreeMap<String, String>, DevError> {
    project
        .read_scripts(dir)
        .map_err(|e| DevError::Project(format!("{e:#}")))
}
