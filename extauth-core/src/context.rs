//! Per-request carrier: [`RequestContext`] and the raw request it wraps.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

/// Case-insensitive header bag extracted from the incoming CheckRequest.
///
/// Keys are stored lower-cased; lookups lower-case the probe key too.
#[derive(Debug, Clone, Default)]
pub struct Headers(HashMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Build from an iterator of raw `(key, value)` pairs, lower-casing keys.
    /// Later entries win on collision, matching a proxy's header map semantics.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = HashMap::new();
        for (k, v) in pairs {
            map.insert(k.into().to_ascii_lowercase(), v.into());
        }
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_ascii_lowercase()).map(String::as_str)
    }
}

/// The raw incoming CheckRequest, opaque to the rest of the core and
/// accessed only through [`RequestContext`]'s accessors.
///
/// Built by the gRPC transport layer (`extauth-grpc`) from the wire
/// `CheckRequest` message; kept wire-format-agnostic here so the pipeline
/// never depends on generated protobuf types.
#[derive(Debug, Clone, Default)]
pub struct RawCheckRequest {
    pub headers: Headers,
    /// `request.http.host` / `:authority`, if present on the wire.
    pub authority: Option<String>,
    /// `source.address.socket_address.address`, the transport-level peer
    /// address reported by the proxy (no port).
    pub transport_source_address: Option<String>,
}

/// Headers tried, in order, before falling back to the transport-level
/// source address. See spec §6 "Source-IP extraction".
const SOURCE_IP_HEADERS: &[&str] = &[
    "x-client-ip",
    "x-forwarded-for",
    "cf-connecting-ip",
    "fastly-client-ip",
    "true-client-ip",
    "x-real-ip",
    "x-cluster-client-ip",
    "x-forwarded",
    "forwarded-for",
    "forwarded",
];

/// Strip a trailing `:port` from a bare IPv4 host, and bracket-strip IPv6.
/// Returns the candidate unchanged if it doesn't look like `ip:port`.
fn strip_port(candidate: &str) -> &str {
    let candidate = candidate.trim();
    if let Some(rest) = candidate.strip_prefix('[') {
        // `[::1]:8080` or bare `[::1]`
        if let Some(end) = rest.find(']') {
            return &rest[..end];
        }
    }
    // Only strip `:port` for things that parse as IPv4:port (a bare IPv6
    // address contains multiple colons and must be left alone).
    if candidate.matches(':').count() == 1 {
        if let Some((host, port)) = candidate.rsplit_once(':') {
            if port.chars().all(|c| c.is_ascii_digit()) {
                return host;
            }
        }
    }
    candidate
}

/// Extract the source IP per spec §6: try header-based candidates in
/// order, falling back to the transport-level address.
pub fn extract_source_ip(raw: &RawCheckRequest) -> Option<IpAddr> {
    for header in SOURCE_IP_HEADERS {
        let Some(value) = raw.headers.get(header) else {
            continue;
        };
        let candidate = if *header == "x-forwarded-for" {
            value.split(',').next().unwrap_or(value).trim()
        } else {
            value.trim()
        };
        let candidate = strip_port(candidate);
        if let Ok(ip) = candidate.parse::<IpAddr>() {
            return Some(ip);
        }
    }
    raw.transport_source_address
        .as_deref()
        .and_then(|a| strip_port(a).parse::<IpAddr>().ok())
}

const RESERVED_LOG_KEYS: &[&str] = &["ip", "authority"];

/// Thread-safe, ordered (key, value) log-field accumulator.
///
/// `"ip"` and `"authority"` are pre-populated at construction and reserved:
/// later writes under those keys are silently dropped. Readers always see a
/// fully-formed snapshot, never a partially constructed field list.
#[derive(Debug, Clone)]
pub struct LogFields {
    inner: Arc<Mutex<Vec<(String, String)>>>,
}

impl LogFields {
    fn new(ip: String, authority: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(vec![
                ("ip".to_string(), ip),
                ("authority".to_string(), authority),
            ])),
        }
    }

    /// Add a field. Silently dropped if `key` is one of the reserved keys.
    pub fn add(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if RESERVED_LOG_KEYS.contains(&key.as_str()) {
            return;
        }
        self.inner.lock().push((key, value.into()));
    }

    /// A consistent point-in-time snapshot of all fields added so far.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.inner.lock().clone()
    }

    /// Number of fields currently recorded, including the two reserved ones.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-request carrier created once per incoming CheckRequest and released
/// when the manager produces a response.
#[derive(Clone)]
pub struct RequestContext {
    request: Arc<RawCheckRequest>,
    received_at: Instant,
    authority: String,
    ip_address: Option<IpAddr>,
    log_fields: LogFields,
}

impl RequestContext {
    /// Construct a new context from a raw incoming request.
    pub fn new(request: RawCheckRequest) -> Self {
        let authority = request
            .authority
            .clone()
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| "-".to_string());
        let ip_address = extract_source_ip(&request);
        let ip_display = ip_address
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "-".to_string());
        let log_fields = LogFields::new(ip_display, authority.clone());

        Self {
            request: Arc::new(request),
            received_at: Instant::now(),
            authority,
            ip_address,
            log_fields,
        }
    }

    /// Accessor for the raw incoming request. Opaque beyond `Headers` lookups.
    pub fn request(&self) -> &RawCheckRequest {
        &self.request
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The parsed source address, or `None` if it could not be determined —
    /// the explicit "invalid" state callers must check for before using it.
    pub fn ip_address(&self) -> Option<IpAddr> {
        self.ip_address
    }

    pub fn has_valid_ip(&self) -> bool {
        self.ip_address.is_some()
    }

    pub fn log_fields(&self) -> &LogFields {
        &self.log_fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with_header(key: &str, value: &str) -> RawCheckRequest {
        RawCheckRequest {
            headers: Headers::from_pairs([(key, value)]),
            authority: Some("example.com".into()),
            transport_source_address: Some("10.0.0.9".into()),
        }
    }

    #[test]
    fn prefers_x_client_ip_over_transport_address() {
        let raw = raw_with_header("x-client-ip", "203.0.113.9");
        let ctx = RequestContext::new(raw);
        assert_eq!(ctx.ip_address(), Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn x_forwarded_for_takes_leftmost_entry_and_strips_port() {
        let raw = raw_with_header("x-forwarded-for", "198.51.100.3:443, 10.0.0.1");
        let ctx = RequestContext::new(raw);
        assert_eq!(ctx.ip_address(), Some("198.51.100.3".parse().unwrap()));
    }

    #[test]
    fn falls_back_to_transport_address_when_headers_absent() {
        let raw = RawCheckRequest {
            headers: Headers::new(),
            authority: Some("example.com".into()),
            transport_source_address: Some("192.0.2.55".into()),
        };
        let ctx = RequestContext::new(raw);
        assert_eq!(ctx.ip_address(), Some("192.0.2.55".parse().unwrap()));
    }

    #[test]
    fn unparseable_ip_is_invalid() {
        let raw = RawCheckRequest {
            headers: Headers::new(),
            authority: None,
            transport_source_address: Some("not-an-ip".into()),
        };
        let ctx = RequestContext::new(raw);
        assert!(!ctx.has_valid_ip());
        assert_eq!(ctx.authority(), "-");
    }

    #[test]
    fn reserved_log_keys_are_preloaded_and_protected() {
        let ctx = RequestContext::new(raw_with_header("x-client-ip", "203.0.113.9"));
        ctx.log_fields().add("ip", "should-not-appear");
        ctx.log_fields().add("authority", "should-not-appear-either");
        ctx.log_fields().add("custom", "value");
        let snap = ctx.log_fields().snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0], ("ip".to_string(), "203.0.113.9".to_string()));
        assert_eq!(snap[1], ("authority".to_string(), "example.com".to_string()));
        assert_eq!(snap[2], ("custom".to_string(), "value".to_string()));
    }

    #[test]
    fn concurrent_writers_yield_length_m_plus_two() {
        let ctx = RequestContext::new(raw_with_header("x-client-ip", "203.0.113.9"));
        std::thread::scope(|scope| {
            for i in 0..8 {
                let fields = ctx.log_fields().clone();
                scope.spawn(move || fields.add(format!("k{i}"), "v"));
            }
        });
        assert_eq!(ctx.log_fields().len(), 10);
    }
}
