// crates/sandbox-egress-core/src/interfaces/mod.rs
// ============================================================================
// Module: Sandbox Egress Interfaces
// Description: Collaborator traits for transport, credentials, DNS, and time.
// Purpose: Keep the egress core backend-agnostic and deterministic in tests.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The egress core never talks to the network, the credential store, the DNS
//! resolver, or the clock directly. Each is injected through a trait here so
//! tests can substitute deterministic fakes.
//!
//! Security posture: [`Transport`] implementations may pool connections across
//! tenants, so they must treat every [`OutboundRequest`] as self-contained and
//! never retain per-request headers as connection state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io;
use std::io::Read;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::core::CredentialDescriptor;
use crate::core::CredentialName;
use crate::core::HttpMethod;
use crate::core::TenantId;

// ============================================================================
// SECTION: Transport
// ============================================================================

/// One header attached to an outbound request.
#[derive(Clone, PartialEq, Eq)]
pub struct OutboundHeader {
    /// Header name (lower-cased).
    pub name: String,
    /// Header value.
    pub value: String,
    /// True when the value carries credential material.
    pub sensitive: bool,
}

impl fmt::Debug for OutboundHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = if self.sensitive { "[REDACTED]" } else { self.value.as_str() };
        f.debug_struct("OutboundHeader")
            .field("name", &self.name)
            .field("value", &value)
            .field("sensitive", &self.sensitive)
            .finish()
    }
}

/// Fully formed request handed to the transport for a single attempt.
///
/// # Invariants
/// - `url` already contains the caller's query parameters.
/// - `validated_addrs` are the peer addresses approved for this attempt.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute request URL.
    pub url: String,
    /// Host name as it appears in the URL (brackets stripped).
    pub host: String,
    /// Addresses the destination validator approved for this attempt.
    pub validated_addrs: Vec<SocketAddr>,
    /// Headers to attach to this request only.
    pub headers: Vec<OutboundHeader>,
    /// Optional body bytes.
    pub body: Option<Vec<u8>>,
    /// Timeout for this attempt.
    pub timeout: Duration,
}

/// Raw transport response with an unread body stream.
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers in wire order.
    pub headers: Vec<(String, String)>,
    /// Advertised body length, when present.
    pub content_length: Option<u64>,
    /// Body stream, read incrementally by the governor.
    pub body: Box<dyn Read + Send>,
}

impl TransportResponse {
    /// Returns the first header value with the given name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Transport-level failures for a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connection failed")]
    Connect,
    /// Connection establishment timed out.
    #[error("connect timed out")]
    ConnectTimeout,
    /// The response did not arrive within the attempt timeout.
    #[error("request timed out")]
    ReadTimeout,
    /// The request could not be constructed by the transport.
    #[error("request rejected by transport: {0}")]
    Request(String),
    /// Any other transport failure.
    #[error("transport failure")]
    Other,
}

impl TransportError {
    /// Returns true when the attempt may be retried.
    ///
    /// Only failures that happen before a request reaches the server retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect | Self::ConnectTimeout)
    }

    /// Returns true when the failure is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectTimeout | Self::ReadTimeout)
    }
}

/// Stateless dispatch function over a shared connection pool.
pub trait Transport: Send + Sync {
    /// Sends a request with redirects disabled.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response is obtained.
    fn dispatch(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError>;
}

// ============================================================================
// SECTION: Credential Store
// ============================================================================

/// Credential store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialStoreError {
    /// Store backend failed.
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Tenant-scoped credential lookup owned by the host platform.
pub trait CredentialStore: Send + Sync {
    /// Looks up a descriptor for a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialStoreError`] when the backend fails.
    fn lookup(
        &self,
        tenant: &TenantId,
        name: &CredentialName,
    ) -> Result<Option<CredentialDescriptor>, CredentialStoreError>;

    /// Lists the credential names available to a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialStoreError`] when the backend fails.
    fn list_names(&self, tenant: &TenantId) -> Result<Vec<CredentialName>, CredentialStoreError>;
}

// ============================================================================
// SECTION: DNS + Time
// ============================================================================

/// Hostname resolution used by destination validation.
pub trait HostResolver: Send + Sync {
    /// Resolves a host name to peer IPs.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when resolution fails.
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<IpAddr>>;
}

/// Blocking wait used between retry attempts.
pub trait Sleeper: Send + Sync {
    /// Blocks the calling thread for the duration.
    fn sleep(&self, duration: Duration);
}
