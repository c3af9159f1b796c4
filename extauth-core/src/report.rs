//! Analysis-phase output: [`AnalysisReport`], the aggregate [`AnalysisReports`],
//! and the closed [`AnalysisData`] payload enum.

use std::collections::BTreeMap;

/// The closed set of structured payloads an analysis controller can attach
/// to its report. Kept here, rather than in `extauth-analysis`, so that
/// match controllers living in other crates (`extauth-matchers-list`'s
/// ASN matcher, `extauth-geofence`) can pattern-match on the payload without
/// pulling in the analysis crate itself.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisData {
    Asn { number: u32, organization: String },
    GeoIp {
        latitude: f64,
        longitude: f64,
        country_iso: Option<String>,
    },
    UserAgent {
        family: String,
        is_bot: bool,
        raw: String,
    },
}

impl AnalysisData {
    pub fn as_asn(&self) -> Option<(u32, &str)> {
        match self {
            AnalysisData::Asn { number, organization } => Some((*number, organization.as_str())),
            _ => None,
        }
    }

    pub fn as_geoip(&self) -> Option<(f64, f64, Option<&str>)> {
        match self {
            AnalysisData::GeoIp {
                latitude,
                longitude,
                country_iso,
            } => Some((*latitude, *longitude, country_iso.as_deref())),
            _ => None,
        }
    }

    pub fn as_user_agent(&self) -> Option<(&str, bool, &str)> {
        match self {
            AnalysisData::UserAgent { family, is_bot, raw } => {
                Some((family.as_str(), *is_bot, raw.as_str()))
            }
            _ => None,
        }
    }
}

/// One analysis controller's output for a single request. An analysis
/// controller never denies; a report is either produced or the controller
/// is skipped for this request (on error or opting out with `None`).
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub controller: String,
    pub controller_kind: String,
    /// Headers to add to the upstream request if the overall decision is
    /// ALLOW. Keys are sanitized and ordered at response-synthesis time.
    pub upstream_headers: BTreeMap<String, String>,
    pub data: Option<AnalysisData>,
}

impl AnalysisReport {
    pub fn new(controller: impl Into<String>, controller_kind: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            controller_kind: controller_kind.into(),
            upstream_headers: BTreeMap::new(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: AnalysisData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.upstream_headers.insert(key.into(), value.into());
        self
    }
}

/// All analysis reports produced for one request, keyed by controller name.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReports {
    by_name: BTreeMap<String, AnalysisReport>,
}

impl AnalysisReports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, report: AnalysisReport) {
        self.by_name.insert(report.controller.clone(), report);
    }

    pub fn get(&self, controller_name: &str) -> Option<&AnalysisReport> {
        self.by_name.get(controller_name)
    }

    /// Find the first report produced by a controller of the given kind.
    /// Used by match controllers that need a specific analysis payload
    /// (e.g. the ASN matcher looking for a `maxmind-asn` report) without
    /// caring which name it was configured under.
    pub fn find_by_kind(&self, kind: &str) -> Option<&AnalysisReport> {
        self.by_name.values().find(|r| r.controller_kind == kind)
    }

    /// Reports in ascending controller-name order, the deterministic order
    /// in which their upstream headers are merged into the final response.
    pub fn iter_sorted_by_name(&self) -> impl Iterator<Item = &AnalysisReport> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
