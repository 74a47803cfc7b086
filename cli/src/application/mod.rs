//! Application layer: port trait definitions, the process registry and
//! use-case orchestration.
//!
//! This module depends only on `crate::domain`; never on `crate::infra`,
//! `crate::commands`, or `crate::tools`.

pub mod ports;
pub mod registry;
pub mod services;

pub use ports::{
    CommandRunner, ConfigStore, ExecOutput, ExecRequest, LaunchSpec, ProcessControl,
    ProcessLauncher, ProjectInspector, SecretWrapper,
};
pub use registry::{ProcessRegistry, StartOutcome, StopOutcome};
