//! Match-phase output: [`MatchVerdict`], the aggregate [`MatchVerdicts`],
//! and [`DenyCode`].

use std::collections::BTreeMap;

/// The gRPC status a match controller asks the manager to return when it
/// denies. Restricted to the subset the external authorization contract
/// actually distinguishes between (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DenyCode {
    #[default]
    PermissionDenied,
    Unauthenticated,
}

impl DenyCode {
    /// HTTP status synthesized for the downstream client. Per spec.md §6:
    /// `Unauthenticated` maps to 401, everything else that denies maps to
    /// 403.
    pub fn http_status(self) -> u16 {
        match self {
            DenyCode::Unauthenticated => 401,
            DenyCode::PermissionDenied => 403,
        }
    }
}

/// One match controller's verdict for a single request.
#[derive(Debug, Clone)]
pub struct MatchVerdict {
    pub controller: String,
    pub controller_kind: String,
    pub is_match: bool,
    pub deny_code: DenyCode,
    /// Human-readable reason, surfaced as the denial culprit description.
    pub description: String,
    /// Headers added to the downstream denial response when this verdict
    /// is the one that caused an overall DENY.
    pub deny_downstream_headers: BTreeMap<String, String>,
    /// Headers added to the upstream request when the overall decision is
    /// ALLOW, regardless of whether this specific verdict matched.
    pub allow_upstream_headers: BTreeMap<String, String>,
}

impl MatchVerdict {
    pub fn new(controller: impl Into<String>, controller_kind: impl Into<String>, is_match: bool) -> Self {
        Self {
            controller: controller.into(),
            controller_kind: controller_kind.into(),
            is_match,
            deny_code: DenyCode::default(),
            description: String::new(),
            deny_downstream_headers: BTreeMap::new(),
            allow_upstream_headers: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_deny_code(mut self, code: DenyCode) -> Self {
        self.deny_code = code;
        self
    }

    pub fn with_deny_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.deny_downstream_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_allow_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.allow_upstream_headers.insert(key.into(), value.into());
        self
    }
}

/// All match verdicts produced for one request, keyed by controller name.
#[derive(Debug, Clone, Default)]
pub struct MatchVerdicts {
    by_name: BTreeMap<String, MatchVerdict>,
}

impl MatchVerdicts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, verdict: MatchVerdict) {
        self.by_name.insert(verdict.controller.clone(), verdict);
    }

    pub fn get(&self, controller_name: &str) -> Option<&MatchVerdict> {
        self.by_name.get(controller_name)
    }

    /// A `{name -> is_match}` map, the shape the policy engine evaluates
    /// identifiers against.
    pub fn as_bool_map(&self) -> std::collections::HashMap<String, bool> {
        self.by_name
            .iter()
            .map(|(name, v)| (name.clone(), v.is_match))
            .collect()
    }

    pub fn iter_sorted_by_name(&self) -> impl Iterator<Item = &MatchVerdict> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
