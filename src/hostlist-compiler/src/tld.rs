//! Hostname validation and public-suffix extraction.
//!
//! The suffix tables are a curated snapshot, not the full Public Suffix
//! List. Unknown TLDs that pass label validation are accepted, so behavior
//! stays stable as new TLDs appear.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Maximum length of a hostname in bytes.
pub const MAX_HOSTNAME_LENGTH: usize = 255;

/// Maximum length of a single DNS label.
pub const MAX_LABEL_LENGTH: usize = 63;

/// Curated two-label public suffixes.
static TWO_LABEL_SUFFIXES: &[&str] = &[
    "ac.jp", "ac.uk", "co.il", "co.in", "co.jp", "co.kr", "co.nz", "co.th", "co.uk", "co.za",
    "com.ar", "com.au", "com.bd", "com.br", "com.cn", "com.co", "com.eg", "com.hk", "com.mx",
    "com.my", "com.ph", "com.pk", "com.sa", "com.sg", "com.tr", "com.tw", "com.vn", "edu.au",
    "go.jp", "gov.au", "gov.uk", "ne.jp", "net.au", "net.nz", "net.uk", "or.jp", "or.kr",
    "org.au", "org.il", "org.nz", "org.uk",
];

/// Curated three-label public suffixes.
static THREE_LABEL_SUFFIXES: &[&str] = &["co.com.au", "gov.co.uk", "pvt.k12.ma.us"];

/// Parsed components of a hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHost {
    /// The full hostname, lowercased, without a trailing dot.
    pub hostname: String,
    /// The public suffix (e.g. `co.uk`).
    pub public_suffix: String,
    /// The registrable domain (suffix plus one label), if any.
    pub domain: Option<String>,
    /// Labels left of the registrable domain, if any.
    pub subdomain: Option<String>,
}

/// Check whether `s` is a syntactically valid IPv4 address.
#[must_use]
pub fn is_ipv4(s: &str) -> bool {
    s.parse::<Ipv4Addr>().is_ok()
}

/// Check whether `s` is a syntactically valid IPv6 address.
///
/// A `%zone` suffix is accepted, matching hosts-file usage.
#[must_use]
pub fn is_ipv6(s: &str) -> bool {
    let addr = s.split('%').next().unwrap_or(s);
    addr.parse::<Ipv6Addr>().is_ok()
}

/// Check whether `s` is a syntactically valid IP address of either family.
#[must_use]
pub fn is_ip(s: &str) -> bool {
    is_ipv4(s) || is_ipv6(s)
}

/// Check whether `label` is a valid DNS label.
///
/// Labels are 1..=63 characters, alphanumeric with interior hyphens.
#[must_use]
pub fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
        return false;
    }
    let bytes = label.as_bytes();
    if !bytes[0].is_ascii_alphanumeric() || !bytes[bytes.len() - 1].is_ascii_alphanumeric() {
        return false;
    }
    bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
}

/// Check whether `hostname` is a valid DNS hostname.
///
/// A single trailing dot is tolerated.
#[must_use]
pub fn is_valid_hostname(hostname: &str) -> bool {
    let hostname = hostname.strip_suffix('.').unwrap_or(hostname);
    if hostname.is_empty() || hostname.len() > MAX_HOSTNAME_LENGTH {
        return false;
    }
    hostname.split('.').all(is_valid_label)
}

/// Extract the public suffix of a hostname.
///
/// Multi-part suffixes are matched exactly on the last two or three labels
/// before falling back to the final label. Returns `None` when the input is
/// not a valid hostname.
#[must_use]
pub fn get_public_suffix(hostname: &str) -> Option<String> {
    let hostname = normalize(hostname)?;
    let labels: Vec<&str> = hostname.split('.').collect();

    if labels.len() >= 3 {
        let candidate = labels[labels.len() - 3..].join(".");
        if THREE_LABEL_SUFFIXES.binary_search(&candidate.as_str()).is_ok() {
            return Some(candidate);
        }
    }
    if labels.len() >= 2 {
        let candidate = labels[labels.len() - 2..].join(".");
        if TWO_LABEL_SUFFIXES.binary_search(&candidate.as_str()).is_ok() {
            return Some(candidate);
        }
    }

    labels.last().map(|l| (*l).to_string())
}

/// Extract the registrable domain (public suffix plus one label).
///
/// Returns `None` for invalid hostnames and for hostnames that are
/// themselves a public suffix.
#[must_use]
pub fn get_domain(hostname: &str) -> Option<String> {
    let hostname = normalize(hostname)?;
    let suffix = get_public_suffix(&hostname)?;
    if hostname == suffix {
        return None;
    }
    let prefix = hostname.strip_suffix(suffix.as_str())?.strip_suffix('.')?;
    let label = prefix.rsplit('.').next()?;
    Some(format!("{label}.{suffix}"))
}

/// Parse a hostname into suffix/domain/subdomain components.
#[must_use]
pub fn parse(hostname: &str) -> Option<ParsedHost> {
    let hostname = normalize(hostname)?;
    let public_suffix = get_public_suffix(&hostname)?;
    let domain = get_domain(&hostname);
    let subdomain = domain.as_ref().and_then(|d| {
        let prefix = hostname.strip_suffix(d.as_str())?.strip_suffix('.')?;
        if prefix.is_empty() {
            None
        } else {
            Some(prefix.to_string())
        }
    });

    Some(ParsedHost {
        hostname,
        public_suffix,
        domain,
        subdomain,
    })
}

fn normalize(hostname: &str) -> Option<String> {
    if !is_valid_hostname(hostname) {
        return None;
    }
    let hostname = hostname.strip_suffix('.').unwrap_or(hostname);
    Some(hostname.to_ascii_lowercase())
}
