//! The `user-agent` analysis controller: classifies the request's
//! `User-Agent` header into a coarse browser family and a bot flag.
//!
//! This is a small, deliberately non-exhaustive ruleset, not a full
//! user-agent parsing library — good enough to drive policy decisions like
//! "deny known bot traffic", not to power analytics.

use async_trait::async_trait;
use extauth_core::context::RequestContext;
use extauth_core::error::{AnalysisError, HealthError};
use extauth_core::report::{AnalysisData, AnalysisReport};
use extauth_core::AnalysisController;

const BOT_MARKERS: &[&str] = &[
    "bot", "crawler", "spider", "crawling", "curl", "wget", "python-requests", "go-http-client",
    "scrapy", "headlesschrome", "phantomjs",
];

const BROWSER_FAMILIES: &[(&str, &str)] = &[
    ("edg/", "Edge"),
    ("opr/", "Opera"),
    ("chrome/", "Chrome"),
    ("crios/", "Chrome"),
    ("firefox/", "Firefox"),
    ("fxios/", "Firefox"),
    ("safari/", "Safari"),
];

fn classify(raw: &str) -> (String, bool) {
    let lower = raw.to_ascii_lowercase();
    let is_bot = BOT_MARKERS.iter().any(|marker| lower.contains(marker));
    let family = BROWSER_FAMILIES
        .iter()
        .find(|(marker, _)| lower.contains(marker))
        .map(|(_, family)| family.to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    (family, is_bot)
}

pub struct UserAgentAnalysisController {
    name: String,
}

impl UserAgentAnalysisController {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl AnalysisController for UserAgentAnalysisController {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "user-agent"
    }

    async fn analyze(&self, ctx: &RequestContext) -> Result<Option<AnalysisReport>, AnalysisError> {
        let Some(raw) = ctx.request().headers.get("user-agent") else {
            return Ok(None);
        };
        let (family, is_bot) = classify(raw);
        Ok(Some(AnalysisReport::new(&self.name, self.kind()).with_data(AnalysisData::UserAgent {
            family,
            is_bot,
            raw: raw.to_string(),
        })))
    }

    async fn health_check(&self) -> Result<(), HealthError> {
        Ok(())
    }
}
