// crates/sandbox-egress/src/lib.rs
// ============================================================================
// Module: Sandbox Egress Library
// Description: HTTP egress capability for sandboxed user scripts.
// Purpose: Expose validated, quota-bound, credential-safe outbound HTTP.
// Dependencies: sandbox-egress-config, sandbox-egress-core, reqwest, url
// ============================================================================

//! ## Overview
//! This crate wires the egress pipeline: [`destination`] blocks SSRF targets,
//! [`governor`] enforces per-execution limits, [`credentials`] resolves
//! tenant-scoped auth headers, [`retry`] bounds retries, and [`facade`]
//! composes them into the verb methods handed to scripts. [`runtime`] builds
//! everything once per process and mints one facade per execution.
//!
//! Security posture: every input from a script is untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod credentials;
pub mod destination;
pub mod facade;
pub mod governor;
pub mod retry;
pub mod runtime;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::EgressLogEvent;
pub use audit::EgressLogSink;
pub use audit::EgressOutcome;
pub use audit::FileEgressLogSink;
pub use audit::NoopEgressLogSink;
pub use audit::StderrEgressLogSink;
pub use credentials::CredentialResolver;
pub use credentials::InMemoryCredentialStore;
pub use destination::DestinationPolicy;
pub use destination::DestinationValidator;
pub use destination::SystemHostResolver;
pub use destination::ValidatedHost;
pub use facade::EgressFacade;
pub use retry::RetryController;
pub use retry::RetryPolicy;
pub use retry::ThreadSleeper;
pub use runtime::EGRESS_CAPABILITY_NAME;
pub use runtime::EgressRuntime;
pub use runtime::EgressRuntimeBuilder;
pub use runtime::RuntimeError;
pub use sandbox_egress_config::EgressConfig;
pub use sandbox_egress_core::CredentialDescriptor;
pub use sandbox_egress_core::CredentialKind;
pub use sandbox_egress_core::CredentialName;
pub use sandbox_egress_core::EgressError;
pub use sandbox_egress_core::EgressErrorKind;
pub use sandbox_egress_core::ExecutionContext;
pub use sandbox_egress_core::ExecutionLimits;
pub use sandbox_egress_core::HttpMethod;
pub use sandbox_egress_core::RequestOptions;
pub use sandbox_egress_core::ResultRecord;
pub use sandbox_egress_core::SecretValue;
pub use sandbox_egress_core::TenantId;
pub use transport::ReqwestTransport;
