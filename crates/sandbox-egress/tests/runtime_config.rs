// crates/sandbox-egress/tests/runtime_config.rs
// ============================================================================
// Module: Runtime Configuration Tests
// Description: Build the runtime from configuration and exercise it end to end.
// Purpose: Validate config wiring for limits, destination policy, and logging.
// Dependencies: sandbox-egress, sandbox-egress-config, tempfile, tiny_http
// ============================================================================

//! ## Overview
//! Builds [`EgressRuntime`] through [`EgressRuntime::from_config`] and checks
//! that quotas, relaxed-mode destination rules, and the file log sink come
//! from configuration.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fs;
use std::sync::Arc;
use std::thread;

use sandbox_egress::EgressConfig;
use sandbox_egress::EgressErrorKind;
use sandbox_egress::EgressRuntime;
use sandbox_egress::InMemoryCredentialStore;
use sandbox_egress::RequestOptions;
use sandbox_egress::RuntimeError;
use sandbox_egress_config::LogSinkKind;
use sandbox_egress_config::LoggingConfig;
use serde_json::Value;
use tiny_http::Response;
use tiny_http::Server;

const RELAXED_CONFIG: &str = r"
[limits]
max_requests = 1

[retry]
max_jitter_ms = 0

[dev]
relaxed = true

[destination]
allow_http = true
allow_private_networks = true

[logging]
sink = 'none'
";

fn store() -> Arc<InMemoryCredentialStore> {
    Arc::new(InMemoryCredentialStore::new())
}

/// Configured quotas, relaxations, and the file sink all apply.
#[test]
fn runtime_from_config_applies_limits_policy_and_logging() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("egress.jsonl");
    let mut config = EgressConfig::from_toml(RELAXED_CONFIG).unwrap();
    config.logging = LoggingConfig {
        sink: LogSinkKind::File,
        path: Some(log_path.clone()),
    };

    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        if let Ok(request) = server.recv() {
            let _ = request.respond(Response::from_string("ok"));
        }
    });

    let runtime = EgressRuntime::from_config(&config, store()).unwrap();
    assert_eq!(runtime.limits().max_requests, 1);
    let mut facade = runtime.facade(None);
    let record = facade
        .get(&format!("http://{addr}/status?token=hunter2"), RequestOptions::new())
        .unwrap();
    handle.join().unwrap();
    assert_eq!(record.text(), "ok");

    let err = facade.get(&format!("http://{addr}/again"), RequestOptions::new()).unwrap_err();
    assert_eq!(err.kind(), EgressErrorKind::RequestLimitExceeded);

    let contents = fs::read_to_string(&log_path).unwrap();
    let events: Vec<Value> =
        contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event"], "egress_request");
    assert_eq!(events[0]["status"], 200);
    assert_eq!(events[0]["outcome"], "ok");
    assert!(!contents.contains("hunter2"));
    assert_eq!(events[1]["error_kind"], "RequestLimitExceeded");
}

/// The default configuration refuses cleartext and loopback targets.
#[test]
fn default_config_is_strict() {
    let config = EgressConfig::from_toml("[logging]\nsink = \"none\"\n").unwrap();
    let runtime = EgressRuntime::from_config(&config, store()).unwrap();
    let mut facade = runtime.facade(None);
    let err = facade.get("http://127.0.0.1:9/", RequestOptions::new()).unwrap_err();
    assert_eq!(err.kind(), EgressErrorKind::InvalidDestination);
    assert_eq!(facade.context().requests_issued(), 0);
}

/// Configs that bypass the parser are still validated.
#[test]
fn invalid_config_is_rejected_at_build() {
    let mut config = EgressConfig::default();
    config.destination.allow_http = true;
    let result = EgressRuntime::from_config(&config, store());
    assert!(matches!(result, Err(RuntimeError::Config(_))));
}
