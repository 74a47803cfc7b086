//! Domain types and validators for devpilot configuration.
//!
//! Pure functions only; no I/O, no async, no filesystem access.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "security.require_confirmation",
    "security.block_dangerous",
    "security.max_timeout_secs",
    "security.read_only",
];
pub const VALID_BOOLEANS: &[&str] = &["true", "false"];

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.devpilot/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct DevpilotConfig {
    /// Guardrail policy.
    pub security: SecurityConfig,
    /// Background-process timings.
    pub registry: RegistryConfig,
}

/// Guardrail policy threaded through every evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Destructive operations need an explicit `confirm: true`.
    pub require_confirmation: bool,
    /// Destructive operations are refused outright.
    pub block_dangerous: bool,
    /// Upper bound applied to every one-shot command timeout.
    pub max_timeout_secs: u64,
    /// Refuse anything that mutates containers or dev servers.
    pub read_only: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            require_confirmation: true,
            block_dangerous: false,
            max_timeout_secs: 600,
            read_only: false,
        }
    }
}

impl SecurityConfig {
    #[must_use]
    pub fn max_timeout(&self) -> Duration {
        Duration::from_secs(self.max_timeout_secs)
    }
}

/// Upper bound on every registry timing, whatever the config file says.
pub const MAX_REGISTRY_WAIT: Duration = Duration::from_secs(600);

fn bounded_millis(ms: u64) -> Duration {
    Duration::from_millis(ms).min(MAX_REGISTRY_WAIT)
}

/// Timings used by the process registry and the dev-server services.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    pub stop_grace_ms: u64,
    pub bulk_stop_grace_ms: u64,
    pub restart_settle_ms: u64,
    pub start_all_delay_ms: u64,
    pub readiness_window_ms: u64,
    pub output_buffer_lines: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            stop_grace_ms: 1500,
            bulk_stop_grace_ms: 3000,
            restart_settle_ms: 500,
            start_all_delay_ms: 500,
            readiness_window_ms: 3000,
            output_buffer_lines: 200,
        }
    }
}

impl RegistryConfig {
    #[must_use]
    pub fn stop_grace(&self) -> Duration {
        bounded_millis(self.stop_grace_ms)
    }

    #[must_use]
    pub fn bulk_stop_grace(&self) -> Duration {
        bounded_millis(self.bulk_stop_grace_ms)
    }

    #[must_use]
    pub fn restart_settle(&self) -> Duration {
        bounded_millis(self.restart_settle_ms)
    }

    #[must_use]
    pub fn start_all_delay(&self) -> Duration {
        bounded_millis(self.start_all_delay_ms)
    }

    #[must_use]
    pub fn readiness_window(&self) -> Duration {
        bounded_millis(self.readiness_window_ms)
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    let ok = match key {
        "security.max_timeout_secs" => value.parse::<u64>().is_ok_and(|v| v > 0),
        _ => VALID_BOOLEANS.contains(&value),
    };
    if !ok {
        let valid = if key == "security.max_timeout_secs" {
            "a positive number of seconds".to_string()
        } else {
            VALID_BOOLEANS.join(", ")
        };
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            valid,
        }
        .into());
    }
    Ok(())
}

/// Apply a validated `key = value` pair to `config`.
///
/// # Errors
///
/// Returns an error if the key or value fails validation.
pub fn apply_setting(config: &mut DevpilotConfig, key: &str, value: &str) -> Result<()> {
    validate_config_key(key)?;
    validate_config_value(key, value)?;
    let flag = value == "true";
    match key {
        "security.require_confirmation" => config.security.require_confirmation = flag,
        "security.block_dangerous" => config.security.block_dangerous = flag,
        "security.read_only" => config.security.read_only = flag,
        "security.max_timeout_secs" => config.security.max_timeout_secs = value.parse()?,
        _ => {}
    }
    Ok(())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
