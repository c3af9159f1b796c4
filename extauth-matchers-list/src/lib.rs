//! Static CIDR/ASN list parsing, synthesis, and the two list-backed match
//! controllers (`ip-match`, `asn-match`).

pub mod asn_match;
pub mod ip_match;
pub mod list;
pub mod synthesize;

use std::sync::Arc;

use extauth_core::error::BuildError;
use extauth_core::registry::MatchControllerFactory;
use extauth_core::MatchController;
use serde::Deserialize;
use thiserror::Error;

pub use asn_match::AsnMatchController;
pub use ip_match::IpMatchController;

#[derive(Debug, Deserialize)]
struct ListSettings {
    path: Option<String>,
    inline: Option<String>,
}

#[derive(Debug, Error)]
enum ListSourceError {
    #[error("list settings must include either `path` or `inline`")]
    MissingSource,
    #[error("failed to read list file {path:?}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn load_text(settings: serde_json::Value, name: &str, kind: &str) -> Result<String, BuildError> {
    let parsed: ListSettings =
        serde_json::from_value(settings).map_err(|source| BuildError::InvalidSettings {
            name: name.to_string(),
            kind: kind.to_string(),
            source,
        })?;
    if let Some(inline) = parsed.inline {
        return Ok(inline);
    }
    if let Some(path) = parsed.path {
        return std::fs::read_to_string(&path)
            .map_err(|source| ListSourceError::ReadFailed { path, source })
            .map_err(|e| BuildError::InitFailed {
                name: name.to_string(),
                kind: kind.to_string(),
                source: Box::new(e),
            });
    }
    Err(BuildError::InitFailed {
        name: name.to_string(),
        kind: kind.to_string(),
        source: Box::new(ListSourceError::MissingSource),
    })
}

/// A [`MatchControllerFactory`] for the `ip-match` kind. Settings must
/// include either `path` (a list file on disk) or `inline` (its contents,
/// mainly useful for tests and small deployments managed entirely in YAML).
pub fn ip_match_factory() -> Arc<dyn MatchControllerFactory> {
    Arc::new(|name: String, settings: serde_json::Value| async move {
        let text = load_text(settings, &name, "ip-match")?;
        let entries = list::parse_ip_list(&text).map_err(|source| BuildError::InitFailed {
            name: name.clone(),
            kind: "ip-match".to_string(),
            source: Box::new(source),
        })?;
        Ok(Arc::new(IpMatchController::new(name, entries)) as Arc<dyn MatchController>)
    })
}

/// A [`MatchControllerFactory`] for the `asn-match` kind. Same settings
/// shape as [`ip_match_factory`].
pub fn asn_match_factory() -> Arc<dyn MatchControllerFactory> {
    Arc::new(|name: String, settings: serde_json::Value| async move {
        let text = load_text(settings, &name, "asn-match")?;
        let entries = list::parse_asn_list(&text).map_err(|source| BuildError::InitFailed {
            name: name.clone(),
            kind: "asn-match".to_string(),
            source: Box::new(source),
        })?;
        Ok(Arc::new(AsnMatchController::new(name, entries)) as Arc<dyn MatchController>)
    })
}
