//! Header-name sanitization and deterministic ordering for synthesized
//! responses.

/// Header names must match this pattern after trimming whitespace; anything
/// else is dropped rather than forwarded, since a malformed name would
/// either be rejected by the transport or silently mangled by it.
fn is_valid_header_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// An insertion-ordered header list with overwrite-on-duplicate-key
/// semantics: setting a key that's already present updates its value in
/// place rather than appending a second entry.
#[derive(Debug, Clone, Default)]
pub struct OrderedHeaders {
    entries: Vec<(String, String)>,
}

impl OrderedHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trim and validate `key`; silently drop the pair if the name doesn't
    /// survive sanitization. Overwrites an existing entry with the same key
    /// in place, preserving its original position.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let key = key.trim();
        if !is_valid_header_name(key) {
            return;
        }
        let value = value.into();
        let value = value.trim().to_string();
        if let Some(existing) = self.entries.iter_mut().find(|(k, _)| k == key) {
            existing.1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
    }

    pub fn extend_sorted<'a>(&mut self, pairs: impl IntoIterator<Item = (&'a String, &'a String)>) {
        let mut sorted: Vec<_> = pairs.into_iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        for (k, v) in sorted {
            self.set(k, v.clone());
        }
    }

    pub fn into_vec(self) -> Vec<(String, String)> {
        self.entries
    }

    pub fn as_slice(&self) -> &[(String, String)] {
        &self.entries
    }
}
