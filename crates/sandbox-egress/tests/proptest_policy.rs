//! Egress policy property-based tests.
//!
//! ## Purpose
//! These tests exercise address blocking, allowlist enforcement, and retry
//! timing with randomized inputs. They prove fail-closed behavior without
//! network access.
// crates/sandbox-egress/tests/proptest_policy.rs
// ============================================================================
// Module: Egress Policy Property-Based Tests
// Description: Randomized checks for SSRF blocking and retry timing bounds.
// Purpose: Ensure private targets never pass and waits stay bounded.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::io;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use sandbox_egress::DestinationPolicy;
use sandbox_egress::DestinationValidator;
use sandbox_egress::EgressErrorKind;
use sandbox_egress::RetryPolicy;
use sandbox_egress::destination::is_blocked_ip;
use sandbox_egress::retry::parse_retry_after;
use sandbox_egress_core::HostResolver;
use time::OffsetDateTime;

/// Resolver that answers every lookup with one address.
struct FixedResolver(IpAddr);

impl HostResolver for FixedResolver {
    fn resolve(&self, _host: &str, _port: u16) -> io::Result<Vec<IpAddr>> {
        Ok(vec![self.0])
    }
}

fn private_v4() -> impl Strategy<Value = Ipv4Addr> {
    prop_oneof![
        any::<[u8; 3]>().prop_map(|[b, c, d]| Ipv4Addr::new(10, b, c, d)),
        any::<[u8; 3]>().prop_map(|[b, c, d]| Ipv4Addr::new(127, b, c, d)),
        (16_u8..32, any::<[u8; 2]>()).prop_map(|(b, [c, d])| Ipv4Addr::new(172, b, c, d)),
        any::<[u8; 2]>().prop_map(|[c, d]| Ipv4Addr::new(192, 168, c, d)),
        any::<[u8; 2]>().prop_map(|[c, d]| Ipv4Addr::new(169, 254, c, d)),
        (64_u8..128, any::<[u8; 2]>()).prop_map(|(b, [c, d])| Ipv4Addr::new(100, b, c, d)),
        any::<[u8; 3]>().prop_map(|[b, c, d]| Ipv4Addr::new(0, b, c, d)),
    ]
}

/// Splits an IPv4 address into two IPv6 segments.
fn ip_segments(ip: Ipv4Addr) -> [u16; 2] {
    let [a, b, c, d] = ip.octets();
    [u16::from_be_bytes([a, b]), u16::from_be_bytes([c, d])]
}

proptest! {
    #[test]
    fn private_v4_ranges_are_blocked(ip in private_v4()) {
        prop_assert!(is_blocked_ip(&IpAddr::V4(ip)));
    }

    #[test]
    fn mapped_private_v4_is_blocked(ip in private_v4()) {
        prop_assert!(is_blocked_ip(&IpAddr::V6(ip.to_ipv6_mapped())));
    }

    #[test]
    fn unique_local_v6_is_blocked(segments in any::<[u16; 8]>()) {
        let [a, b, c, d, e, f, g, h] = segments;
        let ip = Ipv6Addr::new(0xfd00 | (a & 0x00ff), b, c, d, e, f, g, h);
        prop_assert!(is_blocked_ip(&IpAddr::V6(ip)));
    }

    #[test]
    fn six_to_four_private_v4_is_blocked(ip in private_v4(), tail in any::<[u16; 5]>()) {
        let [hi, lo] = ip_segments(ip);
        let [d, e, f, g, h] = tail;
        let wrapped = Ipv6Addr::new(0x2002, hi, lo, d, e, f, g, h);
        prop_assert!(is_blocked_ip(&IpAddr::V6(wrapped)));
    }

    #[test]
    fn ipv4_compatible_private_v4_is_blocked(ip in private_v4()) {
        let [hi, lo] = ip_segments(ip);
        let wrapped = Ipv6Addr::new(0, 0, 0, 0, 0, 0, hi, lo);
        prop_assert!(is_blocked_ip(&IpAddr::V6(wrapped)));
    }

    #[test]
    fn dns_answers_in_private_ranges_are_rejected(ip in private_v4()) {
        let validator = DestinationValidator::new(
            DestinationPolicy::strict(),
            Arc::new(FixedResolver(IpAddr::V4(ip))),
        );
        let err = validator.validate_str("https://service.example.com/").unwrap_err();
        prop_assert_eq!(err.kind(), EgressErrorKind::InvalidDestination);
    }

    #[test]
    fn unlisted_hosts_are_rejected(host in "[a-z0-9]{1,16}\\.test") {
        let validator = DestinationValidator::new(
            DestinationPolicy::strict().allow_hosts(["api.example.com", "*.example.org"]),
            Arc::new(FixedResolver(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)))),
        );
        let err = validator.validate_str(&format!("https://{host}/path")).unwrap_err();
        prop_assert_eq!(err.kind(), EgressErrorKind::InvalidDestination);
    }

    #[test]
    fn arbitrary_url_strings_do_not_panic(raw in "\\PC{0,64}") {
        let validator = DestinationValidator::new(
            DestinationPolicy::strict(),
            Arc::new(FixedResolver(IpAddr::V4(Ipv4Addr::LOCALHOST))),
        );
        let _ = validator.validate_str(&raw);
    }

    #[test]
    fn backoff_is_bounded_and_monotone(
        base_ms in 1_u64..5_000,
        max_ms in 1_u64..60_000,
        attempt in 0_u32..40,
        jitter_ms in 0_u64..5_000,
    ) {
        let policy = RetryPolicy {
            base_wait: Duration::from_millis(base_ms),
            max_wait: Duration::from_millis(max_ms),
            ..RetryPolicy::default()
        };
        let jitter = Duration::from_millis(jitter_ms);
        let wait = policy.backoff(attempt, jitter);
        prop_assert!(wait <= policy.max_wait);
        prop_assert!(policy.backoff(attempt, Duration::ZERO) <= policy.backoff(attempt + 1, Duration::ZERO));
    }

    #[test]
    fn retry_after_waits_are_clamped(hint_secs in 0_u64..100_000) {
        let policy = RetryPolicy::default();
        let wait = policy.retry_after_wait(Duration::from_secs(hint_secs));
        prop_assert!(wait >= Duration::from_secs(1));
        prop_assert!(wait <= policy.max_wait);
    }

    #[test]
    fn retry_after_seconds_parse_exactly(seconds in 0_u64..1_000_000) {
        let parsed = parse_retry_after(&seconds.to_string(), OffsetDateTime::UNIX_EPOCH);
        prop_assert_eq!(parsed, Some(Duration::from_secs(seconds)));
    }
}
