//! Analysis controllers supplying ASN, GeoIP, and User-Agent enrichment:
//! `maxmind-asn`, `maxmind-geoip`, and `user-agent`.

pub mod asn;
pub mod geoip;
pub mod reader;
pub mod user_agent;

use std::sync::Arc;

use extauth_core::error::BuildError;
use extauth_core::registry::AnalysisControllerFactory;
use extauth_core::AnalysisController;
use serde::Deserialize;

pub use asn::AsnAnalysisController;
pub use geoip::GeoIpAnalysisController;
pub use reader::{AsnReader, GeoIpReader, MaxmindAsnReader, MaxmindGeoIpReader};
pub use user_agent::UserAgentAnalysisController;

#[derive(Debug, Deserialize)]
struct MaxmindSettings {
    /// Path to a GeoLite2-ASN / GeoIP2-ISP (or City) `.mmdb` file.
    path: String,
}

/// A [`AnalysisControllerFactory`] for the `maxmind-asn` kind. Settings:
/// `{"path": "/path/to/GeoLite2-ASN.mmdb"}`.
pub fn maxmind_asn_factory() -> Arc<dyn AnalysisControllerFactory> {
    Arc::new(|name: String, settings: serde_json::Value| async move {
        let parsed: MaxmindSettings =
            serde_json::from_value(settings).map_err(|source| BuildError::InvalidSettings {
                name: name.clone(),
                kind: "maxmind-asn".to_string(),
                source,
            })?;
        let reader = reader::MaxmindAsnReader::open(&parsed.path).map_err(|e| BuildError::InitFailed {
            name: name.clone(),
            kind: "maxmind-asn".to_string(),
            source: Box::new(e),
        })?;
        Ok(Arc::new(AsnAnalysisController::new(name, Arc::new(reader))) as Arc<dyn AnalysisController>)
    })
}

/// A [`AnalysisControllerFactory`] for the `maxmind-geoip` kind. Settings:
/// `{"path": "/path/to/GeoLite2-City.mmdb"}`.
pub fn maxmind_geoip_factory() -> Arc<dyn AnalysisControllerFactory> {
    Arc::new(|name: String, settings: serde_json::Value| async move {
        let parsed: MaxmindSettings =
            serde_json::from_value(settings).map_err(|source| BuildError::InvalidSettings {
                name: name.clone(),
                kind: "maxmind-geoip".to_string(),
                source,
            })?;
        let reader = reader::MaxmindGeoIpReader::open(&parsed.path).map_err(|e| BuildError::InitFailed {
            name: name.clone(),
            kind: "maxmind-geoip".to_string(),
            source: Box::new(e),
        })?;
        Ok(Arc::new(GeoIpAnalysisController::new(name, Arc::new(reader))) as Arc<dyn AnalysisController>)
    })
}

/// A [`AnalysisControllerFactory`] for the `user-agent` kind. Takes no
/// settings.
pub fn user_agent_factory() -> Arc<dyn AnalysisControllerFactory> {
    Arc::new(|name: String, _settings: serde_json::Value| async move {
        Ok(Arc::new(UserAgentAnalysisController::new(name)) as Arc<dyn AnalysisController>)
    })
}
