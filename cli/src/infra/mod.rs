//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, signal
//! delivery, manifest reads, secret-CLI detection and config persistence.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::tools` are forbidden.

pub mod command_runner;
pub mod config;
pub mod process;
pub mod project;
pub mod secrets;
