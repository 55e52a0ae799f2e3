//! Request classification.
//!
//! Maps the observable attributes of a single request to a [`Category`].
//! Classification is pure: the same attributes always yield the same
//! category, and nothing here holds state between calls.
//!
//! Checks run in a fixed order and stop at the first match:
//!
//! 1. unparseable identity -> `Unknown`
//! 2. private, loopback or link-local identity -> `Unknown` (unless opted in)
//! 3. authentication signals -> `AuthEnumeration`
//! 4. crawler User-Agent -> `Crawler`
//! 5. anything else -> `Spam`

pub mod auth;
pub mod signatures;

use std::net::IpAddr;

use ipnet::IpNet;
use malblock_common::{Category, ScannerConfig};
use once_cell::sync::Lazy;
use tracing::debug;

use signatures::SignatureTables;

/// Address ranges that are never classified unless explicitly included.
const NON_PUBLIC_RANGES: &[&str] = &[
    // Loopback
    "127.0.0.0/8",
    "::1/128",
    // Private
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "fc00::/7",
    // Link-local unicast
    "169.254.0.0/16",
    "fe80::/10",
    // Link-local multicast
    "224.0.0.0/24",
    "ff02::/16",
];

static NON_PUBLIC_NETS: Lazy<Vec<IpNet>> = Lazy::new(|| {
    NON_PUBLIC_RANGES
        .iter()
        .filter_map(|range| range.parse().ok())
        .collect()
});

/// Returns `true` for loopback, private and link-local addresses.
pub fn is_non_public(addr: IpAddr) -> bool {
    NON_PUBLIC_NETS.iter().any(|net| net.contains(&addr))
}

/// The attributes of a request the classifier looks at.
#[derive(Debug, Clone, Default)]
pub struct RequestAttributes {
    /// Source identity as reported by the trusted forwarding header.
    pub identity: String,
    /// Request headers as (name, value) pairs in order.
    pub headers: Vec<(String, String)>,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
}

impl RequestAttributes {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            headers: Vec::new(),
            query: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// First value of a header, trimmed. Names compare case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
    }

    /// First decoded value of a query parameter. Names compare exactly.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    pub fn user_agent(&self) -> &str {
        self.header("user-agent").unwrap_or("")
    }
}

/// Stateless request classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    include_private_ips: bool,
    tables: SignatureTables,
}

impl Classifier {
    pub fn new(include_private_ips: bool, tables: SignatureTables) -> Self {
        Self {
            include_private_ips,
            tables,
        }
    }

    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::new(config.include_private_ips, SignatureTables::from_config(config))
    }

    /// Classify a request.
    pub fn classify(&self, request: &RequestAttributes) -> Category {
        let Some(addr) = parse_identity(&request.identity) else {
            debug!(identity = %request.identity, "could not parse identity as IP address");
            return Category::Unknown;
        };

        if !self.include_private_ips && is_non_public(addr) {
            return Category::Unknown;
        }

        if auth::detect_auth_enumeration(request, &self.tables) {
            return Category::AuthEnumeration;
        }

        if self.tables.is_crawler(request.user_agent()) {
            return Category::Crawler;
        }

        Category::Spam
    }

    pub fn includes_private_ips(&self) -> bool {
        self.include_private_ips
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::from_config(&ScannerConfig::default())
    }
}

/// Parse an identity string, mapping IPv4-mapped IPv6 back to IPv4.
fn parse_identity(identity: &str) -> Option<IpAddr> {
    identity
        .trim()
        .parse::<IpAddr>()
        .ok()
        .map(|addr| addr.to_canonical())
}
