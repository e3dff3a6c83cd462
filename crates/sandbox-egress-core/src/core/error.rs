// crates/sandbox-egress-core/src/core/error.rs
// ============================================================================
// Module: Egress Errors
// Description: Closed error taxonomy raised to user scripts.
// Purpose: Give every failing egress call one stable, secret-free error kind.
// Dependencies: thiserror, serde
// ============================================================================

//! ## Overview
//! [`EgressError`] is the single base error for the egress capability. Non-2xx
//! HTTP responses are not errors; they are returned as result records.
//! Messages are written for script authors and never include header values,
//! credential material, or raw transport diagnostics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Stable error kind labels surfaced to the host sandbox.
///
/// # Invariants
/// - Variants are stable for user-visible labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EgressErrorKind {
    /// Execution request quota exhausted.
    RequestLimitExceeded,
    /// Request body exceeded the configured ceiling.
    RequestTooLarge,
    /// Response body exceeded the configured ceiling.
    ResponseTooLarge,
    /// Connection failed after the retry budget was spent.
    ConnectionError,
    /// Request timed out.
    TimeoutError,
    /// URL failed scheme or SSRF validation.
    InvalidDestination,
    /// Credential reference could not be resolved.
    AuthProviderError,
    /// Request could not be constructed from the caller inputs.
    InvalidRequest,
}

impl EgressErrorKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequestLimitExceeded => "RequestLimitExceeded",
            Self::RequestTooLarge => "RequestTooLarge",
            Self::ResponseTooLarge => "ResponseTooLarge",
            Self::ConnectionError => "ConnectionError",
            Self::TimeoutError => "TimeoutError",
            Self::InvalidDestination => "InvalidDestination",
            Self::AuthProviderError => "AuthProviderError",
            Self::InvalidRequest => "InvalidRequest",
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Egress failures raised synchronously to the calling script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EgressError {
    /// The execution has used all of its request quota.
    #[error("request limit exceeded: at most {max_requests} requests per execution")]
    RequestLimitExceeded {
        /// Configured request ceiling.
        max_requests: u32,
    },
    /// The request body is larger than allowed.
    #[error("request body too large: {actual_bytes} bytes exceeds limit of {max_bytes} bytes")]
    RequestTooLarge {
        /// Configured ceiling in bytes.
        max_bytes: usize,
        /// Actual body size in bytes.
        actual_bytes: usize,
    },
    /// The response body is larger than allowed.
    #[error("response body exceeds limit of {max_bytes} bytes")]
    ResponseTooLarge {
        /// Configured ceiling in bytes.
        max_bytes: usize,
    },
    /// Connection could not be established or was interrupted.
    #[error("connection error: {0}")]
    Connection(String),
    /// The request did not complete within its timeout.
    #[error("timeout error: {0}")]
    Timeout(String),
    /// The destination failed scheme or network policy validation.
    #[error("invalid destination: {0}")]
    InvalidDestination(String),
    /// The credential reference could not be resolved.
    #[error("auth provider error: {0}")]
    AuthProvider(String),
    /// The request could not be constructed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl EgressError {
    /// Returns the stable kind for this error.
    #[must_use]
    pub const fn kind(&self) -> EgressErrorKind {
        match self {
            Self::RequestLimitExceeded {
                ..
            } => EgressErrorKind::RequestLimitExceeded,
            Self::RequestTooLarge {
                ..
            } => EgressErrorKind::RequestTooLarge,
            Self::ResponseTooLarge {
                ..
            } => EgressErrorKind::ResponseTooLarge,
            Self::Connection(_) => EgressErrorKind::ConnectionError,
            Self::Timeout(_) => EgressErrorKind::TimeoutError,
            Self::InvalidDestination(_) => EgressErrorKind::InvalidDestination,
            Self::AuthProvider(_) => EgressErrorKind::AuthProviderError,
            Self::InvalidRequest(_) => EgressErrorKind::InvalidRequest,
        }
    }
}
