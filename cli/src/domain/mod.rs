//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod guardrail;
pub mod process;
pub mod query;
pub mod validate;

pub use config::{DevpilotConfig, RegistryConfig, SecurityConfig};
pub use error::{ConfigError, DevError, ExecError, ValidationError};
pub use guardrail::GuardrailDecision;
