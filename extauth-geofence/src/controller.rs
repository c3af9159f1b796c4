//! The geofence match controller: tests the request's `maxmind-geoip`
//! coordinates against a set of named polygons.

use async_trait::async_trait;
use dashmap::DashMap;
use extauth_core::context::RequestContext;
use extauth_core::error::{HealthError, MatchError};
use extauth_core::report::AnalysisReports;
use extauth_core::verdict::MatchVerdict;
use extauth_core::MatchController;
use geo::{Contains, Coord, Point};

use crate::polygon::NamedPolygon;

const GEOIP_ANALYSIS_KIND: &str = "maxmind-geoip";

#[derive(Clone)]
struct CacheEntry {
    matched_names: Vec<String>,
}

pub struct GeofenceMatchController {
    name: String,
    polygons: Vec<NamedPolygon>,
    cache: DashMap<String, CacheEntry>,
}

impl GeofenceMatchController {
    pub fn new(name: impl Into<String>, polygons: Vec<NamedPolygon>) -> Self {
        Self {
            name: name.into(),
            polygons,
            cache: DashMap::new(),
        }
    }

    fn matched_names(&self, latitude: f64, longitude: f64) -> Vec<String> {
        let cache_key = format!("{latitude:.6},{longitude:.6}");
        if let Some(entry) = self.cache.get(&cache_key) {
            return entry.matched_names.clone();
        }

        let point = Point(Coord { x: longitude, y: latitude });
        let matched: Vec<String> = self
            .polygons
            .iter()
            .filter(|p| p.polygon.contains(&point))
            .map(|p| p.name.clone())
            .collect();

        self.cache.insert(cache_key, CacheEntry { matched_names: matched.clone() });
        matched
    }
}

#[async_trait]
impl MatchController for GeofenceMatchController {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "geofence"
    }

    async fn r#match(
        &self,
        _ctx: &RequestContext,
        reports: &AnalysisReports,
    ) -> Result<MatchVerdict, MatchError> {
        let coordinates = reports
            .find_by_kind(GEOIP_ANALYSIS_KIND)
            .and_then(|r| r.data.as_ref())
            .and_then(|d| d.as_geoip());

        let Some((latitude, longitude, _country_iso)) = coordinates else {
            return Ok(MatchVerdict::new(&self.name, self.kind(), false)
                .with_description("no valid coordinates")
                .with_allow_header(format!("X-Geofence-{}", self.name), "false"));
        };
        if latitude == 0.0 && longitude == 0.0 {
            return Ok(MatchVerdict::new(&self.name, self.kind(), false)
                .with_description("no valid coordinates")
                .with_allow_header(format!("X-Geofence-{}", self.name), "false"));
        }

        let matched_names = self.matched_names(latitude, longitude);
        let is_match = !matched_names.is_empty();

        let mut verdict = MatchVerdict::new(&self.name, self.kind(), is_match)
            .with_allow_header(format!("X-Geofence-{}", self.name), is_match.to_string());

        if is_match {
            verdict = verdict
                .with_description(format!("({latitude}, {longitude}) matched {}", matched_names.join(", ")))
                .with_allow_header(format!("X-Geofence-{}-Polygons", self.name), matched_names.join(","));
        } else {
            verdict = verdict.with_description(format!("({latitude}, {longitude}) matched no polygon"));
        }

        Ok(verdict)
    }

    async fn health_check(&self) -> Result<(), HealthError> {
        Ok(())
    }
}
