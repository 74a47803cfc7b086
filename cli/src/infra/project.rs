//! Package-manager resolver: reads `package.json` scripts and builds the
//! invocation for the detected package manager.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use devpilot_common::PackageManager;
use serde::Deserialize;

use crate::application::ports::ProjectInspector;

pub const MANIFEST: &str = "package.json";

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    scripts: BTreeMap<String, String>,
}

/// Production `ProjectInspector` for JavaScript projects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeProject;

impl ProjectInspector for NodeProject {
    fn resolve_dir(&self, cwd: Option<&str>) -> Result<PathBuf> {
        let raw = match cwd {
            Some(c) if c.contains('\0') => anyhow::bail!("working directory contains null bytes"),
            Some(c) => PathBuf::from(c),
            None => std::env::current_dir().context("cannot determine current directory")?,
        };
        let dir = raw
            .canonicalize()
            .with_context(|| format!("cannot access {}", raw.display()))?;
        anyhow::ensure!(dir.is_dir(), "{} is not a directory", dir.display());
        Ok(dir)
    }

    fn read_scripts(&self, dir: &Path) -> Result<BTreeMap<String, String>> {
        let path = dir.join(MANIFEST);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&content)
            .with_context(|| format!("cannot parse {}", path.display()))?;
        Ok(manifest.scripts)
    }

    fn script_command(&self, dir: &Path, script: &str, extra: &[String]) -> Vec<String> {
        PackageManager::detect(|file| dir.join(file).exists()).run_command(script, extra)
    }
}
