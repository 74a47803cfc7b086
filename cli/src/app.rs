//! Application context: unified state passed to every command handler.
//!
//! Holds the output context, the output mode and the effective
//! configuration: the stored file with command-line policy overrides applied
//! on top.

use anyhow::Result;
use clap::Args;

use crate::application::services::config_service;
use crate::domain::config::{DevpilotConfig, SecurityConfig};
use crate::infra::config::YamlConfigStore;
use crate::output::OutputContext;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Security policy overrides. Each flag wins over the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct PolicyFlags {
    /// Refuse anything that mutates dev servers or containers
    #[arg(long, global = true, env = "DEVPILOT_READ_ONLY")]
    pub read_only: bool,

    /// Refuse destructive operations instead of asking for confirmation
    #[arg(long, global = true, env = "DEVPILOT_BLOCK_DANGEROUS")]
    pub block_dangerous: bool,

    /// Allow destructive operations without confirmation
    #[arg(long, global = true, env = "DEVPILOT_NO_CONFIRM")]
    pub no_confirm: bool,

    /// Upper bound in seconds for one-shot command timeouts
    #[arg(long, global = true, env = "DEVPILOT_MAX_TIMEOUT", value_name = "SECS")]
    pub max_timeout: Option<u64>,
}

impl PolicyFlags {
    /// Apply the overrides that were given to `security`.
    pub fn apply(&self, security: &mut SecurityConfig) {
        if self.read_only {
            security.read_only = true;
        }
        if self.block_dangerous {
            security.block_dangerous = true;
        }
        if self.no_confirm {
            security.require_confirmation = false;
        }
        if let Some(secs) = self.max_timeout.filter(|s| *s > 0) {
            security.max_timeout_secs = secs;
        }
    }
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Where the configuration file lives.
    pub config_store: YamlConfigStore,
    /// Stored configuration with policy overrides applied.
    pub config: DevpilotConfig,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or parsed.
    pub fn new(output: &OutputFlags, policy: &PolicyFlags) -> Result<Self> {
        let config_store = YamlConfigStore;
        let mut config = config_service::load_config(&config_store)?;
        policy.apply(&mut config.security);

        let mode = if output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        Ok(Self {
            output: OutputContext::new(output.no_color, output.quiet),
            mode,
            config_store,
            config,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }
}
