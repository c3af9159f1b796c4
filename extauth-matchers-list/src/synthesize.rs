//! List-cleaning: remove entries made redundant by another entry already in
//! the list. Exposed as a public library surface for the `synthesize-*`
//! command-line utilities (external collaborators) to build on.

use std::collections::HashSet;

use crate::list::{AsnEntry, CidrEntry};

pub use crate::list::{format_asn_list, format_ip_list, parse_asn_list, parse_ip_list};

#[derive(Debug, Clone, Default)]
pub struct SynthesizeResult<T> {
    pub kept: Vec<T>,
    pub removed: Vec<T>,
}

/// Remove CIDR entries whose range is strictly covered by any other, wider
/// entry in the list (regardless of the two entries' relative order), and
/// collapse exact duplicates (same prefix) to their first occurrence.
pub fn synthesize_ips(entries: Vec<CidrEntry>) -> SynthesizeResult<CidrEntry> {
    let mut seen_exact = HashSet::new();
    let mut kept = Vec::new();
    let mut removed = Vec::new();

    for (i, entry) in entries.iter().enumerate() {
        let is_duplicate = !seen_exact.insert(entry.network);
        let is_covered = entries.iter().enumerate().any(|(j, other)| {
            i != j
                && other.network.prefix_len() < entry.network.prefix_len()
                && other.network.contains(&entry.network.addr())
            // `addr()` is always inside its own network, so if a wider
            // `other` contains it, `other` contains `entry`'s entire
            // (narrower) range — regardless of which one comes first.
        });
        if is_duplicate || is_covered {
            removed.push(entry.clone());
        } else {
            kept.push(entry.clone());
        }
    }

    SynthesizeResult { kept, removed }
}

/// Remove ASN entries whose number has already been seen earlier in the list.
pub fn synthesize_asns(entries: Vec<AsnEntry>) -> SynthesizeResult<AsnEntry> {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    let mut removed = Vec::new();

    for entry in entries {
        if seen.insert(entry.number) {
            kept.push(entry);
        } else {
            removed.push(entry);
        }
    }

    SynthesizeResult { kept, removed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::parse_ip_list;

    #[test]
    fn wider_prefix_absorbs_narrower_one() {
        let entries = parse_ip_list("10.0.0.0/8\n10.1.2.3/32\n").unwrap();
        let result = synthesize_ips(entries);
        assert_eq!(result.kept.len(), 1);
        assert_eq!(result.removed.len(), 1);
        assert_eq!(result.kept[0].network.prefix_len(), 8);
    }

    #[test]
    fn exact_duplicate_keeps_first_occurrence() {
        let entries = parse_ip_list("10.0.0.0/8\n10.0.0.0/8\n").unwrap();
        let result = synthesize_ips(entries);
        assert_eq!(result.kept.len(), 1);
        assert_eq!(result.removed.len(), 1);
    }

    #[test]
    fn narrower_prefix_listed_before_its_wider_cover_is_still_absorbed() {
        let entries = parse_ip_list("10.1.2.3/32\n10.0.0.0/8\n").unwrap();
        let result = synthesize_ips(entries);
        assert_eq!(result.kept.len(), 1);
        assert_eq!(result.removed.len(), 1);
        assert_eq!(result.kept[0].network.prefix_len(), 8);
    }

    #[test]
    fn disjoint_ranges_are_all_kept() {
        let entries = parse_ip_list("10.0.0.0/8\n192.168.0.0/16\n").unwrap();
        let result = synthesize_ips(entries);
        assert_eq!(result.kept.len(), 2);
        assert!(result.removed.is_empty());
    }

    #[test]
    fn asn_dedup_keeps_first_occurrence() {
        let entries = parse_asn_list("AS1\nAS2\nAS1\n").unwrap();
        let result = synthesize_asns(entries);
        assert_eq!(result.kept.iter().map(|e| e.number).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(result.removed.len(), 1);
    }

    #[test]
    fn synthesize_is_idempotent() {
        let entries = parse_ip_list("10.0.0.0/8\n10.1.2.3/32\n192.168.0.0/16\n").unwrap();
        let once = synthesize_ips(entries);
        let twice = synthesize_ips(once.kept.clone());
        assert_eq!(once.kept, twice.kept);
        assert!(twice.removed.is_empty());
    }
}
