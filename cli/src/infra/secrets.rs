//! Secret wrapper: prefixes commands with a secrets-injection CLI when the
//! project carries that CLI's config file.

use std::path::Path;

use crate::application::ports::SecretWrapper;

/// Config file that marks a project as using a secrets CLI, and the prefix
/// that injects the secrets.
pub const SECRET_PROVIDERS: &[(&str, &[&str])] = &[
    (".infisical.json", &["infisical", "run", "--"]),
    ("doppler.yaml", &["doppler", "run", "--"]),
];

/// Production `SecretWrapper`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CliSecretWrapper;

impl SecretWrapper for CliSecretWrapper {
    fn wrap(&self, command: Vec<String>, dir: &Path, read_only: bool) -> Vec<String> {
        if read_only {
            return command;
        }
        let Some((file, prefix)) = SECRET_PROVIDERS
            .iter()
            .find(|(file, _)| dir.join(file).is_file())
        else {
            return command;
        };
        tracing::debug!(provider = %file, "wrapping command with secrets CLI");
        prefix
            .iter()
            .map(|s| (*s).to_string())
            .chain(command)
            .collect()
    }
}
