//! Config validation tests for sandbox-egress-config.
// crates/sandbox-egress-config/tests/config_validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Validate defaults, bounds, and relaxed-mode gating.
// Purpose: Ensure config parsing is strict and fails closed.
// =============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::time::Duration;

use sandbox_egress_config::ConfigError;
use sandbox_egress_config::EgressConfig;
use sandbox_egress_config::LogSinkKind;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<EgressConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

#[test]
fn empty_config_uses_strict_defaults() -> TestResult {
    let config = EgressConfig::from_toml("").map_err(|err| err.to_string())?;
    let limits = config.execution_limits();
    assert_eq!(limits.max_requests, 10);
    assert_eq!(limits.default_timeout, Duration::from_secs(5));
    assert_eq!(limits.max_timeout, Duration::from_secs(30));
    assert_eq!(limits.max_response_bytes, 1024 * 1024);
    assert_eq!(limits.max_request_bytes, 512 * 1024);
    assert_eq!(config.retry.max_attempts, 3);
    assert!(!config.is_relaxed());
    assert!(!config.destination.allow_http);
    assert!(!config.destination.allow_private_networks);
    assert!(config.destination.allowed_hosts.is_none());
    assert!(!config.transport.pin_dns);
    assert_eq!(config.logging.sink, LogSinkKind::Stderr);
    Ok(())
}

#[test]
fn explicit_sections_override_defaults() -> TestResult {
    let config = EgressConfig::from_toml(
        r#"
[limits]
max_requests = 25
default_timeout_ms = 2000
max_timeout_ms = 10000

[retry]
max_attempts = 5
max_jitter_ms = 0

[destination]
allowed_hosts = ["api.example.com", "*.example.org"]
denied_hosts = ["admin.example.org"]

[transport]
user_agent = "scripts/1.0"
pin_dns = true

[logging]
sink = "none"
"#,
    )
    .map_err(|err| err.to_string())?;
    let limits = config.execution_limits();
    assert_eq!(limits.max_requests, 25);
    assert_eq!(limits.default_timeout, Duration::from_secs(2));
    assert_eq!(limits.max_timeout, Duration::from_secs(10));
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.max_jitter_ms, 0);
    assert_eq!(config.destination.allowed_hosts.as_ref().map(Vec::len), Some(2));
    assert_eq!(config.transport.user_agent, "scripts/1.0");
    assert!(config.transport.pin_dns);
    assert_eq!(config.logging.sink, LogSinkKind::None);
    Ok(())
}

// ============================================================================
// SECTION: Relaxed Mode
// ============================================================================

#[test]
fn allow_http_requires_relaxed_mode() -> TestResult {
    assert_invalid(
        EgressConfig::from_toml("[destination]\nallow_http = true\n"),
        "destination.allow_http requires dev.relaxed = true",
    )
}

#[test]
fn private_networks_require_relaxed_mode() -> TestResult {
    assert_invalid(
        EgressConfig::from_toml("[destination]\nallow_private_networks = true\n"),
        "destination.allow_private_networks requires dev.relaxed = true",
    )
}

#[test]
fn relaxed_mode_accepts_relaxations() -> TestResult {
    let config = EgressConfig::from_toml(
        "[dev]\nrelaxed = true\n\n[destination]\nallow_http = true\nallow_private_networks = true\n",
    )
    .map_err(|err| err.to_string())?;
    assert!(config.is_relaxed());
    assert!(config.destination.allow_http);
    Ok(())
}

// ============================================================================
// SECTION: Bounds
// ============================================================================

#[test]
fn zero_request_quota_is_rejected() -> TestResult {
    assert_invalid(
        EgressConfig::from_toml("[limits]\nmax_requests = 0\n"),
        "limits.max_requests must be between 1",
    )
}

#[test]
fn sub_second_timeout_is_rejected() -> TestResult {
    assert_invalid(
        EgressConfig::from_toml("[limits]\ndefault_timeout_ms = 500\n"),
        "limits timeouts must be at least",
    )
}

#[test]
fn default_timeout_above_ceiling_is_rejected() -> TestResult {
    assert_invalid(
        EgressConfig::from_toml("[limits]\ndefault_timeout_ms = 20000\nmax_timeout_ms = 10000\n"),
        "limits.default_timeout_ms must not exceed limits.max_timeout_ms",
    )
}

#[test]
fn zero_response_ceiling_is_rejected() -> TestResult {
    assert_invalid(
        EgressConfig::from_toml("[limits]\nmax_response_bytes = 0\n"),
        "limits.max_response_bytes must be greater than zero",
    )
}

#[test]
fn base_wait_above_max_wait_is_rejected() -> TestResult {
    assert_invalid(
        EgressConfig::from_toml("[retry]\nbase_wait_ms = 5000\nmax_wait_ms = 1000\n"),
        "retry.base_wait_ms must not exceed retry.max_wait_ms",
    )
}

#[test]
fn host_patterns_must_be_bare_hosts() -> TestResult {
    assert_invalid(
        EgressConfig::from_toml("[destination]\ndenied_hosts = [\"https://evil.example\"]\n"),
        "destination.denied_hosts entries must be bare hosts",
    )?;
    assert_invalid(
        EgressConfig::from_toml("[destination]\nallowed_hosts = [\"*.\"]\n"),
        "destination.allowed_hosts entries must be non-empty",
    )
}

#[test]
fn user_agent_rejects_control_characters() -> TestResult {
    assert_invalid(
        EgressConfig::from_toml("[transport]\nuser_agent = \"bad\\r\\nagent\"\n"),
        "transport.user_agent must not contain control characters",
    )
}

#[test]
fn file_sink_requires_path() -> TestResult {
    assert_invalid(
        EgressConfig::from_toml("[logging]\nsink = \"file\"\n"),
        "logging.path is required",
    )?;
    assert_invalid(
        EgressConfig::from_toml("[logging]\nsink = \"stderr\"\npath = \"egress.log\"\n"),
        "logging.path is only valid",
    )
}

#[test]
fn unknown_fields_are_rejected() {
    let result = EgressConfig::from_toml("[limits]\nmax_requestz = 3\n");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
    let result = EgressConfig::from_toml("[telemetry]\nenabled = true\n");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}
