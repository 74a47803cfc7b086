//! Command implementations

pub mod check;
pub mod config;
pub mod guard;
pub mod run;
pub mod serve;
pub mod version;
