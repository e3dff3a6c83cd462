// crates/sandbox-egress/src/runtime.rs
// ============================================================================
// Module: Egress Runtime
// Description: Process-wide wiring that mints one facade per execution.
// Purpose: Assemble validator, governor limits, credentials, retry, transport.
// Dependencies: sandbox-egress-config, sandbox-egress-core, thiserror
// ============================================================================

//! ## Overview
//! [`EgressRuntime`] is built once per process from [`EgressConfig`] and
//! shared by every execution. The host sandbox calls
//! [`EgressRuntime::facade`] immediately before a script starts and binds the
//! returned [`EgressFacade`] under [`EGRESS_CAPABILITY_NAME`]. Each facade
//! owns a fresh [`ExecutionContext`], so quota and credential caches never
//! leak between executions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use sandbox_egress_config::ConfigError;
use sandbox_egress_config::EgressConfig;
use sandbox_egress_core::CredentialStore;
use sandbox_egress_core::ExecutionContext;
use sandbox_egress_core::ExecutionLimits;
use sandbox_egress_core::HostResolver;
use sandbox_egress_core::Sleeper;
use sandbox_egress_core::TenantId;
use sandbox_egress_core::Transport;
use thiserror::Error;

use crate::audit::EgressLogSink;
use crate::audit::NoopEgressLogSink;
use crate::audit::sink_from_config;
use crate::credentials::CredentialResolver;
use crate::destination::DestinationPolicy;
use crate::destination::DestinationValidator;
use crate::destination::SystemHostResolver;
use crate::facade::EgressFacade;
use crate::retry::RetryController;
use crate::retry::RetryPolicy;
use crate::retry::ThreadSleeper;
use crate::transport::ReqwestTransport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Name under which the facade is bound in the script namespace.
pub const EGRESS_CAPABILITY_NAME: &str = "http";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Runtime construction failures.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// HTTP transport could not be built.
    #[error("egress transport error: {0}")]
    Transport(String),
    /// Log sink could not be opened.
    #[error("egress log sink error: {0}")]
    LogSink(String),
}

// ============================================================================
// SECTION: Runtime
// ============================================================================

/// Shared egress wiring; cheap to clone.
#[derive(Clone)]
pub struct EgressRuntime {
    /// Limits snapshot copied into each execution.
    pub(crate) limits: ExecutionLimits,
    /// Destination gate.
    pub(crate) validator: DestinationValidator,
    /// Credential resolver.
    pub(crate) credentials: CredentialResolver,
    /// Retry loop.
    pub(crate) retry: RetryController,
    /// Shared transport.
    pub(crate) transport: Arc<dyn Transport>,
    /// Event sink.
    pub(crate) log_sink: Arc<dyn EgressLogSink>,
}

impl EgressRuntime {
    /// Builds the production runtime from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the config is invalid, or the transport
    /// or log sink cannot be built.
    pub fn from_config(
        config: &EgressConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, RuntimeError> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config.transport)
            .map_err(|err| RuntimeError::Transport(err.to_string()))?;
        let log_sink =
            sink_from_config(&config.logging).map_err(|err| RuntimeError::LogSink(err.to_string()))?;
        Ok(Self::builder(Arc::new(transport), store)
            .limits(config.execution_limits())
            .destination_policy(DestinationPolicy::from_config(config))
            .retry_policy(RetryPolicy::from_config(&config.retry))
            .log_sink(log_sink)
            .build())
    }

    /// Starts a builder over a transport and credential store.
    ///
    /// Defaults: default limits, strict destination policy, system DNS,
    /// default retry policy, thread sleeps, and a no-op log sink.
    #[must_use]
    pub fn builder(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> EgressRuntimeBuilder {
        EgressRuntimeBuilder {
            limits: ExecutionLimits::default(),
            policy: DestinationPolicy::strict(),
            resolver: Arc::new(SystemHostResolver),
            retry_policy: RetryPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
            transport,
            store,
            log_sink: Arc::new(NoopEgressLogSink),
        }
    }

    /// Returns the limits applied to new executions.
    #[must_use]
    pub const fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Creates a facade with a fresh execution context.
    #[must_use]
    pub fn facade(&self, tenant: Option<TenantId>) -> EgressFacade {
        EgressFacade::new(self.clone(), ExecutionContext::new(tenant, self.limits))
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for [`EgressRuntime`].
pub struct EgressRuntimeBuilder {
    /// Execution limits.
    limits: ExecutionLimits,
    /// Destination policy.
    policy: DestinationPolicy,
    /// DNS resolver.
    resolver: Arc<dyn HostResolver>,
    /// Retry bounds.
    retry_policy: RetryPolicy,
    /// Wait implementation.
    sleeper: Arc<dyn Sleeper>,
    /// Transport.
    transport: Arc<dyn Transport>,
    /// Credential store.
    store: Arc<dyn CredentialStore>,
    /// Event sink.
    log_sink: Arc<dyn EgressLogSink>,
}

impl EgressRuntimeBuilder {
    /// Sets the execution limits.
    #[must_use]
    pub const fn limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the destination policy.
    #[must_use]
    pub fn destination_policy(mut self, policy: DestinationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the DNS resolver.
    #[must_use]
    pub fn host_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the sleeper used between attempts.
    #[must_use]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Sets the log sink.
    #[must_use]
    pub fn log_sink(mut self, sink: Arc<dyn EgressLogSink>) -> Self {
        self.log_sink = sink;
        self
    }

    /// Builds the runtime.
    #[must_use]
    pub fn build(self) -> EgressRuntime {
        EgressRuntime {
            limits: self.limits,
            validator: DestinationValidator::new(self.policy, self.resolver),
            credentials: CredentialResolver::new(self.store),
            retry: RetryController::new(self.retry_policy, self.sleeper),
            transport: self.transport,
            log_sink: self.log_sink,
        }
    }
}
