//! Secret resolution for search provider credentials.
//!
//! Keys are read from an environment variable named in the config and
//! kept in a `SecretString` so they never end up in logs or `Debug`
//! output.

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// Reads a secret from the named environment variable.
///
/// Surrounding whitespace is trimmed and a blank value counts as unset.
pub fn resolve_env_secret(var_name: &str) -> Result<SecretString, SecretError> {
    match std::env::var(var_name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(SecretError::EnvVarNotSet {
                    name: var_name.to_string(),
                });
            }
            Ok(SecretString::from(trimmed))
        }
        Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
            name: var_name.to_string(),
        }),
        Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
            name: var_name.to_string(),
        }),
    }
}
