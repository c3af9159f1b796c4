//! The `maxmind-geoip` analysis controller: attaches the source IP's
//! approximate latitude, longitude, and ISO country code to the request.

use std::sync::Arc;

use async_trait::async_trait;
use extauth_core::context::RequestContext;
use extauth_core::error::{AnalysisError, HealthError};
use extauth_core::report::{AnalysisData, AnalysisReport};
use extauth_core::AnalysisController;

use crate::reader::GeoIpReader;

pub struct GeoIpAnalysisController {
    name: String,
    reader: Arc<dyn GeoIpReader>,
}

impl GeoIpAnalysisController {
    pub fn new(name: impl Into<String>, reader: Arc<dyn GeoIpReader>) -> Self {
        Self { name: name.into(), reader }
    }
}

#[async_trait]
impl AnalysisController for GeoIpAnalysisController {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "maxmind-geoip"
    }

    async fn analyze(&self, ctx: &RequestContext) -> Result<Option<AnalysisReport>, AnalysisError> {
        let Some(ip) = ctx.ip_address() else {
            return Ok(None);
        };
        let Some((latitude, longitude, country_iso)) = self.reader.lookup(ip) else {
            return Ok(None);
        };
        Ok(Some(AnalysisReport::new(&self.name, self.kind()).with_data(AnalysisData::GeoIp {
            latitude,
            longitude,
            country_iso,
        })))
    }

    async fn health_check(&self) -> Result<(), HealthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::test_support::StaticGeoIpReader;
    use extauth_core::context::{Headers, RawCheckRequest};
    use std::collections::HashMap;

    fn ctx(ip: &str) -> RequestContext {
        RequestContext::new(RawCheckRequest {
            headers: Headers::new(),
            authority: Some("example.com".into()),
            transport_source_address: Some(ip.to_string()),
        })
    }

    #[tokio::test]
    async fn attaches_coordinates_when_known() {
        let mut known = HashMap::new();
        known.insert("203.0.113.5".parse().unwrap(), (40.7128, -74.0060, Some("US".to_string())));
        let controller = GeoIpAnalysisController::new("geoip", Arc::new(StaticGeoIpReader(known)));
        let report = controller.analyze(&ctx("203.0.113.5")).await.unwrap().unwrap();
        assert_eq!(report.data.unwrap().as_geoip(), Some((40.7128, -74.0060, Some("US"))));
    }

    #[tokio::test]
    async fn skips_unknown_ip() {
        let controller = GeoIpAnalysisController::new("geoip", Arc::new(StaticGeoIpReader::default()));
        assert!(controller.analyze(&ctx("203.0.113.5")).await.unwrap().is_none());
    }
}
