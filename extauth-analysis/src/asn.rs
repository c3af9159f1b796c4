//! The `maxmind-asn` analysis controller: attaches the source IP's
//! autonomous system number and organization to the request.

use std::sync::Arc;

use async_trait::async_trait;
use extauth_core::context::RequestContext;
use extauth_core::error::{AnalysisError, HealthError};
use extauth_core::report::{AnalysisData, AnalysisReport};
use extauth_core::AnalysisController;

use crate::reader::AsnReader;

pub struct AsnAnalysisController {
    name: String,
    reader: Arc<dyn AsnReader>,
}

impl AsnAnalysisController {
    pub fn new(name: impl Into<String>, reader: Arc<dyn AsnReader>) -> Self {
        Self { name: name.into(), reader }
    }
}

#[async_trait]
impl AnalysisController for AsnAnalysisController {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "maxmind-asn"
    }

    async fn analyze(&self, ctx: &RequestContext) -> Result<Option<AnalysisReport>, AnalysisError> {
        let Some(ip) = ctx.ip_address() else {
            return Ok(None);
        };
        let Some((number, organization)) = self.reader.lookup(ip) else {
            return Ok(None);
        };
        Ok(Some(
            AnalysisReport::new(&self.name, self.kind())
                .with_header("X-ASN-Number", number.to_string())
                .with_header("X-ASN-Organization", organization.clone())
                .with_data(AnalysisData::Asn { number, organization }),
        ))
    }

    async fn health_check(&self) -> Result<(), HealthError> {
        Ok(())
    }
}
