//! Application service: configuration use-cases.

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::domain::config::{DevpilotConfig, apply_setting};

/// Load configuration.
///
/// # Errors
///
/// Returns an error if the stored file cannot be read or parsed.
pub fn load_config(store: &impl ConfigStore) -> Result<DevpilotConfig> {
    store.load()
}

/// Save configuration.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_config(store: &impl ConfigStore, config: &DevpilotConfig) -> Result<()> {
    store.save(config)
}

/// Validate `key = value`, apply it to the stored configuration and persist
/// the result. Returns the updated configuration.
///
/// # Errors
///
/// Returns an error for unknown keys, invalid values, or I/O failures.
pub fn set_value(store: &impl ConfigStore, key: &str, value: &str) -> Result<DevpilotConfig> {
    let mut config = store.load()?;
    apply_setting(&mut config, key, value)?;
    store.save(&config)?;
    Ok(config)
}
