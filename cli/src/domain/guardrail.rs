//! Guardrail evaluator: policy decisions layered on top of the validator.
//!
//! Pure functions only; no I/O, no async. A decision is one of allowed,
//! confirmation-required or blocked; combining several decisions keeps the
//! most severe one.

use std::time::Duration;

use crate::domain::config::SecurityConfig;
use crate::domain::error::DevError;
use crate::domain::validate::{
    DESTRUCTIVE_ACTIONS, container_path, host_path, is_destructive, is_under_any,
    split_flag, volume_specs,
};

/// Actions refused in read-only mode: every destructive action plus anything
/// that builds, publishes or changes running containers.
pub const READ_ONLY_EXTRA_ACTIONS: &[&str] = &["build", "push", "up", "restart", "exec"];

/// Actions that need confirmation even when not destructive.
pub const PRIVILEGED_ACTIONS: &[&str] = &["build", "run", "exec", "system"];

/// Script-name suffixes of package lifecycle hooks.
pub const LIFECYCLE_HOOK_SUFFIXES: &[&str] = &[
    "install",
    "postinstall",
    "preinstall",
    "prepare",
    "prepublish",
    "prepublishonly",
];

/// Host paths that may never be mounted into a container.
pub const BLOCKED_MOUNT_SOURCES: &[&str] = &[
    "/var/run/docker.sock",
    "/run/docker.sock",
    "/proc",
    "/sys",
    "/dev",
    "/etc",
    "/var",
    "/usr",
    "/bin",
    "/sbin",
    "/boot",
    "/root",
    "/home",
];

/// Container-side mount targets that shadow system directories.
pub const SENSITIVE_MOUNT_TARGETS: &[&str] = &[
    "/etc", "/usr", "/bin", "/sbin", "/lib", "/boot", "/proc", "/sys", "/dev", "/var",
];

/// Outcome of a guardrail evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allowed,
    ConfirmationRequired(String),
    Blocked(String),
}

impl GuardrailDecision {
    fn severity(&self) -> u8 {
        match self {
            Self::Allowed => 0,
            Self::ConfirmationRequired(_) => 1,
            Self::Blocked(_) => 2,
        }
    }

    /// Keep whichever of the two decisions is more severe. Ties keep `self`.
    #[must_use]
    pub fn most_severe(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    #[must_use]
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Self::ConfirmationRequired(_))
    }

    /// Turn the decision into a gate. `confirmed` is the caller's explicit
    /// override and only lifts confirmation requirements.
    ///
    /// # Errors
    ///
    /// `DevError::Policy` when blocked, `DevError::ConfirmationRequired`
    /// when confirmation is needed and was not given.
    pub fn enforce(self, confirmed: bool) -> Result<(), DevError> {
        match self {
            Self::Allowed => Ok(()),
            Self::ConfirmationRequired(_) if confirmed => Ok(()),
            Self::ConfirmationRequired(reason) => Err(DevError::ConfirmationRequired(reason)),
            Self::Blocked(reason) => Err(DevError::Policy(reason)),
        }
    }
}

fn dangerous(config: &SecurityConfig, reason: String) -> GuardrailDecision {
    if config.block_dangerous {
        GuardrailDecision::Blocked(reason)
    } else if config.require_confirmation {
        GuardrailDecision::ConfirmationRequired(reason)
    } else {
        GuardrailDecision::Allowed
    }
}

/// Classify an action and its arguments under `config`.
#[must_use]
pub fn evaluate_operation<S: AsRef<str>>(
    action: &str,
    args: &[S],
    config: &SecurityConfig,
) -> GuardrailDecision {
    if config.read_only
        && (DESTRUCTIVE_ACTIONS.contains(&action) || READ_ONLY_EXTRA_ACTIONS.contains(&action))
    {
        return GuardrailDecision::Blocked(format!("'{action}' is not allowed in read-only mode"));
    }
    if is_destructive(action, args) {
        return dangerous(config, format!("'{action}' is a destructive operation"));
    }
    if PRIVILEGED_ACTIONS.contains(&action) && config.require_confirmation {
        return GuardrailDecision::ConfirmationRequired(format!(
            "'{action}' is a privileged operation"
        ));
    }
    GuardrailDecision::Allowed
}

/// Classify a package script by name. Lifecycle hooks run arbitrary
/// dependency code and are treated as dangerous.
#[must_use]
pub fn evaluate_script(script: &str, config: &SecurityConfig) -> GuardrailDecision {
    let name = script.rsplit(':').next().unwrap_or(script).to_ascii_lowercase();
    if LIFECYCLE_HOOK_SUFFIXES.iter().any(|hook| name.ends_with(hook)) {
        return dangerous(
            config,
            format!("script '{script}' looks like a package lifecycle hook"),
        );
    }
    GuardrailDecision::Allowed
}

/// Check every volume mount in a container argument list.
#[must_use]
pub fn evaluate_volume_mounts(args: &[String]) -> GuardrailDecision {
    let mut decision = GuardrailDecision::Allowed;
    for spec in volume_specs(args) {
        if let Some(host) = host_path(&spec)
            && is_under_any(&host, BLOCKED_MOUNT_SOURCES)
        {
            decision = decision.most_severe(GuardrailDecision::Blocked(format!(
                "mounting host path '{host}' is not allowed"
            )));
        }
        if let Some(target) = container_path(&spec)
            && (target == "/" || is_under_any(&target, SENSITIVE_MOUNT_TARGETS))
        {
            decision = decision.most_severe(GuardrailDecision::ConfirmationRequired(format!(
                "mount target '{target}' shadows a system directory"
            )));
        }
    }
    decision
}

/// Check network and privilege flags in a container argument list.
#[must_use]
pub fn evaluate_network_settings(args: &[String]) -> GuardrailDecision {
    let mut decision = GuardrailDecision::Allowed;
    for (i, arg) in args.iter().enumerate() {
        let (flag, inline) = split_flag(arg);
        match flag {
            "--network" | "--net" => {
                let value = inline.or_else(|| args.get(i + 1).map(String::as_str));
                if value == Some("host") {
                    decision = decision.most_severe(GuardrailDecision::Blocked(
                        "host networking is not allowed".to_string(),
                    ));
                }
            }
            "--privileged" => {
                decision = decision.most_severe(GuardrailDecision::Blocked(
                    "privileged containers are not allowed".to_string(),
                ));
            }
            f if f.starts_with("--cap-add") => {
                decision = decision.most_severe(GuardrailDecision::ConfirmationRequired(format!(
                    "'{arg}' grants extra capabilities"
                )));
            }
            _ => {}
        }
    }
    decision
}

/// Refuse registry mutations (start/stop/restart, metadata writes) in
/// read-only mode.
#[must_use]
pub fn evaluate_session_mutation(operation: &str, config: &SecurityConfig) -> GuardrailDecision {
    if config.read_only {
        GuardrailDecision::Blocked(format!("{operation} is not allowed in read-only mode"))
    } else {
        GuardrailDecision::Allowed
    }
}

/// Bound a requested timeout by the configured maximum.
#[must_use]
pub fn clamp_timeout(requested: Duration, config: &SecurityConfig) -> Duration {
    requested.min(config.max_timeout())
}
