//! GeoJSON FeatureCollection loading: validation and `MultiPolygon`
//! expansion into individually-named planar polygons.

use geo::{Coord, LineString, Polygon};
use geojson::{GeoJson, Value as GeoValue};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeofenceLoadError {
    #[error("failed to parse GeoJSON: {0}")]
    Parse(String),
    #[error("expected a FeatureCollection at the top level")]
    NotAFeatureCollection,
    #[error("feature is missing a geometry")]
    MissingGeometry,
    #[error("feature is missing a non-empty string `name` property")]
    MissingName,
    #[error("duplicate feature name {name:?}")]
    DuplicateName { name: String },
    #[error("feature {name:?} has a geometry type other than Polygon/MultiPolygon")]
    UnsupportedGeometry { name: String },
    #[error("feature {name:?} has a ring with fewer than 4 points")]
    RingTooShort { name: String },
    #[error("feature {name:?} has a ring that is not closed (first point != last point)")]
    RingNotClosed { name: String },
    #[error("feature {name:?} has a coordinate out of GPS range: ({lon}, {lat})")]
    CoordinateOutOfRange { name: String, lon: f64, lat: f64 },
}

/// A named polygon ready for point-in-polygon testing. `MultiPolygon`
/// features are expanded into one `NamedPolygon` per constituent polygon,
/// named `<feature-name>-<index>`.
#[derive(Debug, Clone)]
pub struct NamedPolygon {
    pub name: String,
    pub polygon: Polygon<f64>,
}

fn validate_ring(name: &str, ring: &[Vec<f64>]) -> Result<LineString<f64>, GeofenceLoadError> {
    if ring.len() < 4 {
        return Err(GeofenceLoadError::RingTooShort { name: name.to_string() });
    }
    let first = &ring[0];
    let last = &ring[ring.len() - 1];
    if first[0] != last[0] || first[1] != last[1] {
        return Err(GeofenceLoadError::RingNotClosed { name: name.to_string() });
    }
    let mut coords = Vec::with_capacity(ring.len());
    for position in ring {
        let lon = position[0];
        let lat = position[1];
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(GeofenceLoadError::CoordinateOutOfRange { name: name.to_string(), lon, lat });
        }
        coords.push(Coord { x: lon, y: lat });
    }
    Ok(LineString::new(coords))
}

fn build_polygon(name: &str, rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>, GeofenceLoadError> {
    let mut linestrings = rings
        .iter()
        .map(|ring| validate_ring(name, ring))
        .collect::<Result<Vec<_>, _>>()?;
    let exterior = linestrings.remove(0);
    Ok(Polygon::new(exterior, linestrings))
}

/// Parse and validate a GeoJSON FeatureCollection, expanding MultiPolygon
/// features into individually-named polygons.
pub fn load_feature_collection(text: &str) -> Result<Vec<NamedPolygon>, GeofenceLoadError> {
    let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| GeofenceLoadError::Parse(e.to_string()))?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(GeofenceLoadError::NotAFeatureCollection);
    };

    let mut seen_names = std::collections::HashSet::new();
    let mut polygons = Vec::new();

    for feature in collection.features {
        let name = feature
            .property("name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or(GeofenceLoadError::MissingName)?
            .to_string();
        if !seen_names.insert(name.clone()) {
            return Err(GeofenceLoadError::DuplicateName { name });
        }

        let geometry = feature.geometry.ok_or(GeofenceLoadError::MissingGeometry)?;
        match geometry.value {
            GeoValue::Polygon(rings) => {
                let polygon = build_polygon(&name, &rings)?;
                polygons.push(NamedPolygon { name, polygon });
            }
            GeoValue::MultiPolygon(polys) => {
                for (index, rings) in polys.iter().enumerate() {
                    let part_name = format!("{name}-{index}");
                    let polygon = build_polygon(&part_name, rings)?;
                    polygons.push(NamedPolygon { name: part_name, polygon });
                }
            }
            _ => return Err(GeofenceLoadError::UnsupportedGeometry { name }),
        }
    }

    Ok(polygons)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_feature(name: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "properties": { "name": name },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]]
            }
        })
    }

    #[test]
    fn loads_a_simple_polygon() {
        let fc = serde_json::json!({
            "type": "FeatureCollection",
            "features": [square_feature("zone-a")]
        });
        let polygons = load_feature_collection(&fc.to_string()).unwrap();
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].name, "zone-a");
    }

    #[test]
    fn expands_multipolygon_with_index_suffix() {
        let fc = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "name": "archipelago" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]],
                        [[[10.0, 10.0], [10.0, 11.0], [11.0, 11.0], [11.0, 10.0], [10.0, 10.0]]]
                    ]
                }
            }]
        });
        let polygons = load_feature_collection(&fc.to_string()).unwrap();
        assert_eq!(polygons.len(), 2);
        assert_eq!(polygons[0].name, "archipelago-0");
        assert_eq!(polygons[1].name, "archipelago-1");
    }

    #[test]
    fn rejects_unclosed_ring() {
        let fc = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "name": "bad" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]]]
                }
            }]
        });
        let err = load_feature_collection(&fc.to_string()).unwrap_err();
        assert!(matches!(err, GeofenceLoadError::RingNotClosed { .. }));
    }

    #[test]
    fn rejects_missing_name() {
        let fc = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]]
                }
            }]
        });
        let err = load_feature_collection(&fc.to_string()).unwrap_err();
        assert!(matches!(err, GeofenceLoadError::MissingName));
    }

    #[test]
    fn rejects_duplicate_names() {
        let fc = serde_json::json!({
            "type": "FeatureCollection",
            "features": [square_feature("zone-a"), square_feature("zone-a")]
        });
        let err = load_feature_collection(&fc.to_string()).unwrap_err();
        assert!(matches!(err, GeofenceLoadError::DuplicateName { .. }));
    }
}
