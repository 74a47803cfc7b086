//! Named script profiles for starting several dev servers at once.

use thiserror::Error;

/// Profile names accepted by `devStartAll`.
pub const PROFILE_NAMES: &[&str] = &["web", "api", "fullstack", "workers"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Unknown profile '{name}'. Available profiles: {available}")]
    Unknown { name: String, available: String },
}

/// Script names for a named profile.
pub fn profile_scripts(name: &str) -> Result<&'static [&'static str], ProfileError> {
    match name {
        "web" => Ok(&["dev"]),
        "api" => Ok(&["api", "server"]),
        "fullstack" => Ok(&["dev", "api", "server"]),
        "workers" => Ok(&["worker", "queue"]),
        _ => Err(ProfileError::Unknown {
            name: name.to_string(),
            available: PROFILE_NAMES.join(", "),
        }),
    }
}
