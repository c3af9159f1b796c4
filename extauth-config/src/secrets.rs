//! `${...}` placeholder resolution for configuration string values.
//!
//! Supports three reference forms inside a placeholder:
//! - `${VAR_NAME}` — resolved from an environment variable
//! - `${env:VAR_NAME}` — same, spelled explicitly
//! - `${file:/path/to/secret}` — the trimmed contents of a file

use crate::ConfigError;

pub trait SecretResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<String, ConfigError>;
}

pub struct DefaultSecretResolver;

impl SecretResolver for DefaultSecretResolver {
    fn resolve(&self, reference: &str) -> Result<String, ConfigError> {
        if let Some(path) = reference.strip_prefix("file:") {
            std::fs::read_to_string(path.trim())
                .map(|s| s.trim().to_string())
                .map_err(|source| ConfigError::SecretFile { path: path.trim().to_string(), source })
        } else if let Some(var) = reference.strip_prefix("env:") {
            std::env::var(var.trim()).map_err(|_| ConfigError::MissingSecret { reference: reference.to_string() })
        } else {
            std::env::var(reference.trim())
                .map_err(|_| ConfigError::MissingSecret { reference: reference.to_string() })
        }
    }
}

/// Resolve every `${...}` placeholder appearing in `value`.
pub fn resolve_placeholders(value: &str, resolver: &dyn SecretResolver) -> Result<String, ConfigError> {
    let mut result = value.to_string();
    while let Some(start) = result.find("${") {
        let end = result[start..]
            .find('}')
            .ok_or_else(|| ConfigError::UnclosedPlaceholder { value: value.to_string() })?;
        let reference = &result[start + 2..start + end];
        let resolved = resolver.resolve(reference)?;
        result = format!("{}{}{}", &result[..start], resolved, &result[start + end + 1..]);
    }
    Ok(result)
}
