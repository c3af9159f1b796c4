//! The geofence match controller: GeoJSON polygon loading, MultiPolygon
//! expansion, and planar point-in-polygon matching.

pub mod controller;
pub mod polygon;

use std::sync::Arc;

use extauth_core::error::BuildError;
use extauth_core::registry::MatchControllerFactory;
use extauth_core::MatchController;
use serde::Deserialize;
use thiserror::Error;

pub use controller::GeofenceMatchController;
pub use polygon::{load_feature_collection, NamedPolygon};

#[derive(Debug, Deserialize)]
struct GeofenceSettings {
    path: Option<String>,
    inline: Option<String>,
}

#[derive(Debug, Error)]
enum GeofenceSourceError {
    #[error("geofence settings must include either `path` or `inline`")]
    MissingSource,
    #[error("failed to read GeoJSON file {path:?}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A [`MatchControllerFactory`] for the `geofence` kind. Settings must
/// include either `path` (a GeoJSON file on disk) or `inline` (its
/// contents).
pub fn geofence_factory() -> Arc<dyn MatchControllerFactory> {
    Arc::new(|name: String, settings: serde_json::Value| async move {
        let parsed: GeofenceSettings =
            serde_json::from_value(settings).map_err(|source| BuildError::InvalidSettings {
                name: name.clone(),
                kind: "geofence".to_string(),
                source,
            })?;

        let text = if let Some(inline) = parsed.inline {
            inline
        } else if let Some(path) = parsed.path {
            std::fs::read_to_string(&path)
                .map_err(|source| GeofenceSourceError::ReadFailed { path, source })
                .map_err(|e| BuildError::InitFailed {
                    name: name.clone(),
                    kind: "geofence".to_string(),
                    source: Box::new(e),
                })?
        } else {
            return Err(BuildError::InitFailed {
                name: name.clone(),
                kind: "geofence".to_string(),
                source: Box::new(GeofenceSourceError::MissingSource),
            });
        };

        let polygons = load_feature_collection(&text).map_err(|source| BuildError::InitFailed {
            name: name.clone(),
            kind: "geofence".to_string(),
            source: Box::new(source),
        })?;

        Ok(Arc::new(GeofenceMatchController::new(name, polygons)) as Arc<dyn MatchController>)
    })
}
