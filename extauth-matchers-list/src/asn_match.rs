//! The `asn-match` controller: match the request's ASN (as reported by an
//! upstream `maxmind-asn` analysis controller) against a static number list.

use std::collections::HashMap;

use async_trait::async_trait;
use extauth_core::context::RequestContext;
use extauth_core::error::{HealthError, MatchError};
use extauth_core::report::AnalysisReports;
use extauth_core::verdict::MatchVerdict;
use extauth_core::MatchController;

use crate::list::AsnEntry;

const ASN_ANALYSIS_KIND: &str = "maxmind-asn";

pub struct AsnMatchController {
    name: String,
    by_number: HashMap<u32, Option<String>>,
}

impl AsnMatchController {
    pub fn new(name: impl Into<String>, entries: Vec<AsnEntry>) -> Self {
        let by_number = entries.into_iter().map(|e| (e.number, e.comment)).collect();
        Self {
            name: name.into(),
            by_number,
        }
    }
}

#[async_trait]
impl MatchController for AsnMatchController {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "asn-match"
    }

    async fn r#match(
        &self,
        _ctx: &RequestContext,
        reports: &AnalysisReports,
    ) -> Result<MatchVerdict, MatchError> {
        let Some(report) = reports.find_by_kind(ASN_ANALYSIS_KIND) else {
            return Ok(MatchVerdict::new(&self.name, self.kind(), false)
                .with_description("no ASN information available"));
        };
        let Some((number, _organization)) = report.data.as_ref().and_then(|d| d.as_asn()) else {
            return Ok(MatchVerdict::new(&self.name, self.kind(), false)
                .with_description("no ASN information available"));
        };

        let verdict = match self.by_number.get(&number) {
            Some(comment) => {
                let description = match comment {
                    Some(comment) => format!("AS{number} matched ({comment})"),
                    None => format!("AS{number} matched"),
                };
                MatchVerdict::new(&self.name, self.kind(), true).with_description(description)
            }
            None => MatchVerdict::new(&self.name, self.kind(), false)
                .with_description(format!("AS{number} did not match any entry in the list")),
        };
        Ok(verdict)
    }

    async fn health_check(&self) -> Result<(), HealthError> {
        Ok(())
    }
}
