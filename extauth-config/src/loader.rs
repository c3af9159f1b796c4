//! YAML loading: parse, resolve `${...}` placeholders in every string leaf,
//! then deserialize into [`crate::Config`].

use serde_yaml::Value;

use crate::secrets::SecretResolver;
use crate::ConfigError;

fn resolve_value(value: Value, resolver: &dyn SecretResolver) -> Result<Value, ConfigError> {
    match value {
        Value::String(s) if s.contains("${") => {
            Ok(Value::String(crate::secrets::resolve_placeholders(&s, resolver)?))
        }
        Value::Sequence(items) => Ok(Value::Sequence(
            items.into_iter().map(|v| resolve_value(v, resolver)).collect::<Result<_, _>>()?,
        )),
        Value::Mapping(map) => {
            let mut resolved = serde_yaml::Mapping::new();
            for (k, v) in map {
                resolved.insert(k, resolve_value(v, resolver)?);
            }
            Ok(Value::Mapping(resolved))
        }
        other => Ok(other),
    }
}

/// Parse a YAML document's text, resolving `${...}` placeholders in every
/// string value before deserializing into `T`.
pub fn load_str<T: serde::de::DeserializeOwned>(
    text: &str,
    resolver: &dyn SecretResolver,
) -> Result<T, ConfigError> {
    let raw: Value = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse { source })?;
    let resolved = resolve_value(raw, resolver)?;
    serde_yaml::from_value(resolved).map_err(|source| ConfigError::Parse { source })
}

/// Read and parse a YAML file at `path`.
pub fn load_file<T: serde::de::DeserializeOwned>(
    path: &str,
    resolver: &dyn SecretResolver,
) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_string(),
        source,
    })?;
    load_str(&text, resolver)
}
