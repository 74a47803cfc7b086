use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Package manager that owns a JavaScript project, detected from its lock file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

/// Lock files in detection priority order. The first one present wins.
pub const LOCK_FILES: &[(&str, PackageManager)] = &[
    ("bun.lockb", PackageManager::Bun),
    ("bun.lock", PackageManager::Bun),
    ("pnpm-lock.yaml", PackageManager::Pnpm),
    ("yarn.lock", PackageManager::Yarn),
    ("package-lock.json", PackageManager::Npm),
];

impl PackageManager {
    /// Detect the package manager given a predicate telling whether a file
    /// exists in the project root. Falls back to npm.
    pub fn detect(exists: impl Fn(&str) -> bool) -> Self {
        LOCK_FILES
            .iter()
            .find(|(file, _)| exists(file))
            .map_or(Self::Npm, |(_, pm)| *pm)
    }

    /// Executable name.
    pub fn program(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pnpm => "pnpm",
            Self::Yarn => "yarn",
            Self::Bun => "bun",
        }
    }

    /// Full invocation for running `script`, with `extra` forwarded to the
    /// script itself.
    pub fn run_command(self, script: &str, extra: &[String]) -> Vec<String> {
        let mut cmd = vec![self.program().to_string(), "run".to_string(), script.to_string()];
        if !extra.is_empty() {
            // yarn forwards trailing args without a separator
            if self != Self::Yarn {
                cmd.push("--".to_string());
            }
            cmd.extend(extra.iter().cloned());
        }
        cmd
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.program())
    }
}

/// Render the registry key for a `(script, directory)` pair.
pub fn process_key(script: &str, cwd: &str) -> String {
    format!("{script}@{cwd}")
}

/// Serializable snapshot of one tracked background process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessInfo {
    pub key: String,
    pub script: String,
    pub cwd: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub command: Vec<String>,
    /// Advisory: set when early output looked like a server announcing itself.
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ProcessInfo {
    /// The invocation command joined with spaces.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Which pipe a captured output line came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// One line of child-process output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: StreamKind,
    pub line: String,
}
