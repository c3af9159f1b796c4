//! The `ip-match` controller: match the request's source IP against a
//! static CIDR list loaded once at construction.

use async_trait::async_trait;
use dashmap::DashMap;
use extauth_core::context::RequestContext;
use extauth_core::error::{HealthError, MatchError};
use extauth_core::report::AnalysisReports;
use extauth_core::verdict::MatchVerdict;
use extauth_core::MatchController;

use crate::list::CidrEntry;

pub struct IpMatchController {
    name: String,
    entries: Vec<CidrEntry>,
    /// Index of the matching entry, or `None`, keyed by the string form of
    /// the looked-up IP. Unbounded — the list itself is small and static.
    cache: DashMap<String, Option<usize>>,
}

impl IpMatchController {
    pub fn new(name: impl Into<String>, entries: Vec<CidrEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
            cache: DashMap::new(),
        }
    }

    fn lookup(&self, ip_key: &str, ip: std::net::IpAddr) -> Option<usize> {
        if let Some(cached) = self.cache.get(ip_key) {
            return *cached;
        }
        let found = self.entries.iter().position(|e| e.network.contains(&ip));
        self.cache.insert(ip_key.to_string(), found);
        found
    }
}

#[async_trait]
impl MatchController for IpMatchController {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "ip-match"
    }

    async fn r#match(
        &self,
        ctx: &RequestContext,
        _reports: &AnalysisReports,
    ) -> Result<MatchVerdict, MatchError> {
        let Some(ip) = ctx.ip_address() else {
            return Ok(MatchVerdict::new(&self.name, self.kind(), false)
                .with_description("unable to determine source IP address"));
        };
        let ip_key = ip.to_string();
        let found = self.lookup(&ip_key, ip);

        let verdict = match found {
            Some(idx) => {
                let entry = &self.entries[idx];
                let description = match &entry.comment {
                    Some(comment) => format!("IP {ip_key} matched CIDR {} ({comment})", entry.network),
                    None => format!("IP {ip_key} matched CIDR {}", entry.network),
                };
                MatchVerdict::new(&self.name, self.kind(), true).with_description(description)
            }
            None => MatchVerdict::new(&self.name, self.kind(), false)
                .with_description(format!("{ip_key} did not match any entry in the list")),
        };
        Ok(verdict)
    }

    async fn health_check(&self) -> Result<(), HealthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::parse_ip_list;
    use extauth_core::context::{Headers, RawCheckRequest};

    fn ctx_with_ip(ip: &str) -> RequestContext {
        RequestContext::new(RawCheckRequest {
            headers: Headers::new(),
            authority: Some("example.com".into()),
            transport_source_address: Some(ip.to_string()),
        })
    }

    #[tokio::test]
    async fn matches_and_caches_result() {
        let entries = parse_ip_list("# internal\n10.0.0.0/8\n").unwrap();
        let controller = IpMatchController::new("internal-ips", entries);
        let reports = AnalysisReports::new();

        let verdict = controller.r#match(&ctx_with_ip("10.1.2.3"), &reports).await.unwrap();
        assert!(verdict.is_match);
        assert!(verdict.description.contains("internal"));

        // Second call should hit the cache and produce the same verdict.
        let verdict = controller.r#match(&ctx_with_ip("10.1.2.3"), &reports).await.unwrap();
        assert!(verdict.is_match);
        assert_eq!(controller.cache.len(), 1);
    }

    #[tokio::test]
    async fn invalid_ip_is_not_a_match() {
        let controller = IpMatchController::new("internal-ips", vec![]);
        let ctx = RequestContext::new(RawCheckRequest {
            headers: Headers::new(),
            authority: None,
            transport_source_address: Some("garbage".into()),
        });
        let verdict = controller.r#match(&ctx, &AnalysisReports::new()).await.unwrap();
        assert!(!verdict.is_match);
        assert_eq!(verdict.description, "unable to determine source IP address");
    }

    #[tokio::test]
    async fn match_description_names_ip_and_cidr() {
        let entries = parse_ip_list("203.0.113.0/24\n").unwrap();
        let controller = IpMatchController::new("internal-ips", entries);
        let verdict = controller
            .r#match(&ctx_with_ip("203.0.113.5"), &AnalysisReports::new())
            .await
            .unwrap();
        assert_eq!(verdict.description, "IP 203.0.113.5 matched CIDR 203.0.113.0/24");
    }

    #[tokio::test]
    async fn no_match_names_the_ip() {
        let entries = parse_ip_list("192.168.0.0/16\n").unwrap();
        let controller = IpMatchController::new("internal-ips", entries);
        let verdict = controller
            .r#match(&ctx_with_ip("203.0.113.9"), &AnalysisReports::new())
            .await
            .unwrap();
        assert!(!verdict.is_match);
        assert!(verdict.description.contains("203.0.113.9"));
    }
}
