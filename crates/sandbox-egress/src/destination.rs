// crates/sandbox-egress/src/destination.rs
// ============================================================================
// Module: Destination Validation
// Description: Scheme, host, and resolved-address checks for outbound URLs.
// Purpose: Block SSRF targets before every attempt, retries included.
// Dependencies: sandbox-egress-core, url
// ============================================================================

//! ## Overview
//! [`DestinationValidator`] checks a URL against a [`DestinationPolicy`] and
//! resolves its host through an injected [`HostResolver`]. Every resolved
//! address must pass; one blocked address rejects the whole destination.
//! Nothing is cached between validations, so each attempt sees a fresh lookup.
//!
//! Security posture: DNS may change between validation and connection. That
//! gap is accepted unless the transport pins the validated addresses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;
use std::sync::Arc;

use sandbox_egress_config::EgressConfig;
use sandbox_egress_core::EgressError;
use sandbox_egress_core::HostResolver;
use url::Host;
use url::Url;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Scheme and host policy for outbound destinations.
///
/// # Invariants
/// - Denylist rules are evaluated before allowlist rules.
/// - Private, loopback, link-local, reserved, and multicast ranges are denied
///   unless `allow_private_networks` is set.
/// - Only `https` is accepted unless `allow_http` is set.
#[derive(Debug, Clone, Default)]
pub struct DestinationPolicy {
    /// Accept cleartext `http://` URLs.
    allow_http: bool,
    /// Accept private and otherwise non-public addresses.
    allow_private_networks: bool,
    /// Optional allowlist of host patterns.
    allowlist: Option<Vec<HostPattern>>,
    /// Denied host patterns.
    denylist: Vec<HostPattern>,
}

impl DestinationPolicy {
    /// Creates the strict production policy.
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
    }

    /// Creates the relaxed development policy (cleartext HTTP allowed).
    #[must_use]
    pub fn relaxed() -> Self {
        Self {
            allow_http: true,
            ..Self::default()
        }
    }

    /// Builds the policy described by configuration.
    #[must_use]
    pub fn from_config(config: &EgressConfig) -> Self {
        let destination = &config.destination;
        let mut policy = Self::strict().deny_hosts(&destination.denied_hosts);
        if let Some(allowed) = &destination.allowed_hosts {
            policy = policy.allow_hosts(allowed);
        }
        if config.is_relaxed() {
            policy.allow_http = destination.allow_http;
            policy.allow_private_networks = destination.allow_private_networks;
        }
        policy
    }

    /// Replaces the allowlist with the provided hosts.
    #[must_use]
    pub fn allow_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowlist = Some(parse_host_patterns(hosts));
        self
    }

    /// Replaces the denylist with the provided hosts.
    #[must_use]
    pub fn deny_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.denylist = parse_host_patterns(hosts);
        self
    }

    /// Allows cleartext HTTP.
    #[must_use]
    pub const fn allow_http(mut self) -> Self {
        self.allow_http = true;
        self
    }

    /// Allows private and otherwise non-public address ranges.
    #[must_use]
    pub const fn allow_private_networks(mut self) -> Self {
        self.allow_private_networks = true;
        self
    }
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Host that passed validation for one attempt.
///
/// # Invariants
/// - `addrs` is non-empty and deduplicated.
/// - Every entry in `addrs` passed the address policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedHost {
    /// Host string used for connection (brackets stripped).
    pub host: String,
    /// Normalized host label used in policy messages.
    pub host_label: String,
    /// Effective request port.
    pub port: u16,
    /// Approved peer addresses.
    pub addrs: Vec<IpAddr>,
}

impl ValidatedHost {
    /// Returns the approved peer socket addresses.
    #[must_use]
    pub fn socket_addrs(&self) -> Vec<SocketAddr> {
        self.addrs.iter().map(|ip| SocketAddr::new(*ip, self.port)).collect()
    }
}

/// SSRF gate run before every attempt.
#[derive(Clone)]
pub struct DestinationValidator {
    /// Destination policy.
    policy: DestinationPolicy,
    /// DNS resolver.
    resolver: Arc<dyn HostResolver>,
}

impl DestinationValidator {
    /// Creates a validator with the given policy and resolver.
    #[must_use]
    pub fn new(policy: DestinationPolicy, resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            policy,
            resolver,
        }
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> &DestinationPolicy {
        &self.policy
    }

    /// Parses and validates a URL string.
    ///
    /// # Errors
    ///
    /// Returns [`EgressError::InvalidDestination`] when the URL is malformed
    /// or fails policy.
    pub fn validate_str(&self, raw: &str) -> Result<ValidatedHost, EgressError> {
        let url = Url::parse(raw)
            .map_err(|_| EgressError::InvalidDestination("url is not valid".to_string()))?;
        self.validate(&url)
    }

    /// Checks scheme, userinfo, and host lists without resolving DNS.
    ///
    /// # Errors
    ///
    /// Returns [`EgressError::InvalidDestination`] when the URL fails policy.
    pub fn check_url(&self, url: &Url) -> Result<(), EgressError> {
        match url.scheme() {
            "https" => {}
            "http" if self.policy.allow_http => {}
            "http" => {
                return Err(EgressError::InvalidDestination(
                    "only https urls are permitted".to_string(),
                ));
            }
            _ => {
                return Err(EgressError::InvalidDestination("unsupported url scheme".to_string()));
            }
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(EgressError::InvalidDestination(
                "url credentials are not allowed".to_string(),
            ));
        }
        let host = url
            .host()
            .ok_or_else(|| EgressError::InvalidDestination("url host required".to_string()))?;
        let host_label = normalize_host_label(&host);
        if self.policy.denylist.iter().any(|pattern| pattern.matches(&host_label)) {
            return Err(EgressError::InvalidDestination(format!("host denied: {host_label}")));
        }
        if let Some(allowlist) = &self.policy.allowlist
            && !allowlist.iter().any(|pattern| pattern.matches(&host_label))
        {
            return Err(EgressError::InvalidDestination(format!(
                "host not in allowlist: {host_label}"
            )));
        }
        Ok(())
    }

    /// Validates a URL and resolves its host for one attempt.
    ///
    /// # Errors
    ///
    /// Returns [`EgressError::InvalidDestination`] when the URL fails policy,
    /// DNS resolution fails, or any resolved address is blocked.
    pub fn validate(&self, url: &Url) -> Result<ValidatedHost, EgressError> {
        self.check_url(url)?;
        let host = url
            .host()
            .ok_or_else(|| EgressError::InvalidDestination("url host required".to_string()))?;
        let host_label = normalize_host_label(&host);
        let port = url
            .port_or_known_default()
            .ok_or_else(|| EgressError::InvalidDestination("url port required".to_string()))?;
        let mut addrs = match &host {
            Host::Ipv4(ip) => vec![IpAddr::V4(*ip)],
            Host::Ipv6(ip) => vec![IpAddr::V6(*ip)],
            Host::Domain(domain) => self.resolver.resolve(domain, port).map_err(|_| {
                EgressError::InvalidDestination(format!("host resolution failed: {host_label}"))
            })?,
        };
        if addrs.is_empty() {
            return Err(EgressError::InvalidDestination(format!(
                "host has no resolved addresses: {host_label}"
            )));
        }
        if !self.policy.allow_private_networks && addrs.iter().any(is_blocked_ip) {
            return Err(EgressError::InvalidDestination(format!(
                "host resolves to a blocked address range: {host_label}"
            )));
        }
        dedupe_ips(&mut addrs);
        Ok(ValidatedHost {
            host: owned_host(&host),
            host_label,
            port,
            addrs,
        })
    }
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolver backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostResolver;

impl HostResolver for SystemHostResolver {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<IpAddr>> {
        (host, port).to_socket_addrs().map(|iter| iter.map(|addr| addr.ip()).collect())
    }
}

// ============================================================================
// SECTION: Host Patterns
// ============================================================================

/// Host allow/deny pattern.
#[derive(Debug, Clone)]
enum HostPattern {
    /// Exact host match.
    Exact(String),
    /// Wildcard suffix match (for example: *.example.com).
    WildcardSuffix(String),
}

impl HostPattern {
    /// Parses a host pattern string into a normalized matcher.
    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let normalized = normalize_host_string(trimmed);
        if let Some(suffix) = normalized.strip_prefix("*.") {
            if suffix.is_empty() {
                return None;
            }
            return Some(Self::WildcardSuffix(suffix.to_string()));
        }
        Some(Self::Exact(normalized))
    }

    /// Returns true when the pattern matches the provided host.
    fn matches(&self, host: &str) -> bool {
        match self {
            Self::Exact(value) => host == value,
            Self::WildcardSuffix(suffix) => {
                if host.len() <= suffix.len() || !host.ends_with(suffix.as_str()) {
                    return false;
                }
                let boundary = host.len() - suffix.len() - 1;
                host.as_bytes().get(boundary) == Some(&b'.')
            }
        }
    }
}

/// Parses an iterable of host patterns into normalized matchers.
fn parse_host_patterns<I, S>(hosts: I) -> Vec<HostPattern>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    hosts.into_iter().filter_map(|host| HostPattern::parse(host.as_ref())).collect()
}

// ============================================================================
// SECTION: Address Policy
// ============================================================================

/// Returns true when an address is not a public unicast destination.
#[must_use]
pub fn is_blocked_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => is_blocked_ipv4(*addr),
        IpAddr::V6(addr) => is_blocked_ipv6(addr),
    }
}

/// Checks IPv4 private, loopback, link-local, and reserved ranges.
fn is_blocked_ipv4(addr: Ipv4Addr) -> bool {
    let [a, b, c, _] = addr.octets();
    addr.is_private()
        || addr.is_loopback()
        || addr.is_link_local()
        || addr.is_unspecified()
        || addr.is_multicast()
        || addr.is_broadcast()
        || addr.is_documentation()
        || a == 0
        || (a == 100 && (b & 0xc0) == 64)
        || (a == 192 && b == 0 && c == 0)
        || (a == 192 && b == 88 && c == 99)
        || (a == 198 && (b & 0xfe) == 18)
        || a >= 240
}

/// Checks IPv6 ranges, including embedded IPv4 forms.
fn is_blocked_ipv6(addr: &Ipv6Addr) -> bool {
    if let Some(mapped) = addr.to_ipv4_mapped() {
        return is_blocked_ipv4(mapped);
    }
    let segments = addr.segments();
    let [s0, s1, s2, s3, s4, s5, s6, s7] = segments;
    // NAT64 (64:ff9b::/96) carries IPv4 in the low bits.
    if [s0, s1, s2, s3, s4, s5] == [0x64, 0xff9b, 0, 0, 0, 0] {
        return is_blocked_ipv4(embedded_ipv4(s6, s7));
    }
    // Deprecated IPv4-compatible (::/96); `::/112` covers `::` and `::1`.
    if [s0, s1, s2, s3, s4, s5] == [0; 6] {
        return s6 == 0 || is_blocked_ipv4(embedded_ipv4(s6, s7));
    }
    // 6to4 carries IPv4 in segments 1 and 2.
    if s0 == 0x2002 {
        return is_blocked_ipv4(embedded_ipv4(s1, s2));
    }
    addr.is_loopback()
        || addr.is_unspecified()
        || [s0, s1, s2, s3] == [0x0100, 0, 0, 0]
        || (s0 == 0x2001 && s1 < 0x0200)
        || addr.is_multicast()
        || addr.is_unique_local()
        || addr.is_unicast_link_local()
        || (s0 & 0xffc0) == 0xfec0
        || (s0 == 0x2001 && s1 == 0x0db8)
}

/// Rebuilds an IPv4 address from two IPv6 segments.
fn embedded_ipv4(hi: u16, lo: u16) -> Ipv4Addr {
    Ipv4Addr::from((u32::from(hi) << 16) | u32::from(lo))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Normalizes a host label into a lowercase string for matching.
fn normalize_host_label(host: &Host<&str>) -> String {
    match host {
        Host::Domain(domain) => normalize_host_string(domain),
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => ip.to_string(),
    }
}

/// Normalizes raw host strings by trimming trailing dots and brackets.
fn normalize_host_string(host: &str) -> String {
    let trimmed = host.trim_end_matches('.');
    let trimmed =
        trimmed.strip_prefix('[').and_then(|inner| inner.strip_suffix(']')).unwrap_or(trimmed);
    trimmed.to_ascii_lowercase()
}

/// Converts a host reference into the string used for connecting.
fn owned_host(host: &Host<&str>) -> String {
    match host {
        Host::Domain(domain) => (*domain).to_string(),
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => ip.to_string(),
    }
}

/// Removes duplicate IPs while preserving order.
fn dedupe_ips(ips: &mut Vec<IpAddr>) {
    let mut unique = Vec::with_capacity(ips.len());
    for ip in ips.drain(..) {
        if !unique.contains(&ip) {
            unique.push(ip);
        }
    }
    *ips = unique;
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    #[test]
    fn wildcard_patterns_require_label_boundary() {
        let pattern = HostPattern::parse("*.example.com").unwrap();
        assert!(pattern.matches("api.example.com"));
        assert!(!pattern.matches("example.com"));
        assert!(!pattern.matches("badexample.com"));
    }

    #[test]
    fn reserved_ranges_are_blocked() {
        for raw in [
            "10.0.0.5",
            "127.0.0.1",
            "169.254.169.254",
            "100.64.0.1",
            "198.18.0.1",
            "0.1.2.3",
            "240.0.0.1",
            "255.255.255.255",
            "224.0.0.1",
            "::1",
            "fe80::1",
            "fd00::1",
            "fec0::1",
            "::ffff:10.0.0.1",
            "64:ff9b::a00:1",
            "192.88.99.1",
            "2002:a00:5::",
            "2002:7f00:1::1",
            "::a00:5",
            "::7f00:1",
            "100::1",
            "2001::1",
            "2001:1ff::1",
        ] {
            let ip: IpAddr = raw.parse().unwrap();
            assert!(is_blocked_ip(&ip), "{raw} should be blocked");
        }
    }

    #[test]
    fn public_addresses_are_allowed() {
        for raw in [
            "93.184.216.34",
            "8.8.8.8",
            "2606:4700::1111",
            "64:ff9b::808:808",
            "2002:808:808::1",
            "::808:808",
        ] {
            let ip: IpAddr = raw.parse().unwrap();
            assert!(!is_blocked_ip(&ip), "{raw} should be allowed");
        }
    }
}
