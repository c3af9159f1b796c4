//! List file parsing: one entry per line, `#` line comments that become the
//! *group comment* for subsequent entries until a blank line resets it.

use std::net::IpAddr;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidrEntry {
    pub network: IpNet,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsnEntry {
    pub number: u32,
    pub comment: Option<String>,
}

#[derive(Debug, Error)]
pub enum ListParseError {
    #[error("line {line}: {token:?} is not a valid CIDR range or IP address")]
    InvalidCidr { line: usize, token: String },
    #[error("line {line}: {token:?} is not a valid ASN")]
    InvalidAsn { line: usize, token: String },
}

fn bare_ip_to_net(addr: IpAddr) -> IpNet {
    match addr {
        IpAddr::V4(v4) => IpNet::V4(Ipv4Net::new(v4, 32).expect("/32 is always valid")),
        IpAddr::V6(v6) => IpNet::V6(Ipv6Net::new(v6, 128).expect("/128 is always valid")),
    }
}

pub fn parse_ip_list(text: &str) -> Result<Vec<CidrEntry>, ListParseError> {
    let mut entries = Vec::new();
    let mut group_comment: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            group_comment = None;
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            group_comment = Some(comment.trim().to_string());
            continue;
        }
        let network = line
            .parse::<IpNet>()
            .ok()
            .or_else(|| line.parse::<IpAddr>().ok().map(bare_ip_to_net))
            .ok_or_else(|| ListParseError::InvalidCidr {
                line: idx + 1,
                token: line.to_string(),
            })?;
        entries.push(CidrEntry {
            network,
            comment: group_comment.clone(),
        });
    }
    Ok(entries)
}

fn parse_asn_token(token: &str) -> Option<u32> {
    let upper = token.to_ascii_uppercase();
    let digits = upper.strip_prefix("AS").map(str::trim).unwrap_or(token);
    digits.parse::<u32>().ok()
}

pub fn parse_asn_list(text: &str) -> Result<Vec<AsnEntry>, ListParseError> {
    let mut entries = Vec::new();
    let mut group_comment: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            group_comment = None;
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            group_comment = Some(comment.trim().to_string());
            continue;
        }
        let number = parse_asn_token(line).ok_or_else(|| ListParseError::InvalidAsn {
            line: idx + 1,
            token: line.to_string(),
        })?;
        entries.push(AsnEntry {
            number,
            comment: group_comment.clone(),
        });
    }
    Ok(entries)
}

/// Render entries back to list-file text, re-emitting each entry's group
/// comment as a `#` line whenever it differs from the previous entry's.
pub fn format_ip_list(entries: &[CidrEntry]) -> String {
    let mut out = String::new();
    let mut last_comment: Option<&str> = None;
    for entry in entries {
        let comment = entry.comment.as_deref();
        if comment != last_comment {
            if let Some(c) = comment {
                out.push_str("# ");
                out.push_str(c);
                out.push('\n');
            } else if last_comment.is_some() {
                out.push('\n');
            }
            last_comment = comment;
        }
        out.push_str(&entry.network.to_string());
        out.push('\n');
    }
    out
}

pub fn format_asn_list(entries: &[AsnEntry]) -> String {
    let mut out = String::new();
    let mut last_comment: Option<&str> = None;
    for entry in entries {
        let comment = entry.comment.as_deref();
        if comment != last_comment {
            if let Some(c) = comment {
                out.push_str("# ");
                out.push_str(c);
                out.push('\n');
            } else if last_comment.is_some() {
                out.push('\n');
            }
            last_comment = comment;
        }
        out.push_str(&format!("AS{}\n", entry.number));
    }
    out
}
