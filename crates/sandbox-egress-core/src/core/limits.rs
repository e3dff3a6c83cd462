// crates/sandbox-egress-core/src/core/limits.rs
// ============================================================================
// Module: Execution Limits
// Description: Immutable quota snapshot for a single script execution.
// Purpose: Carry request count, body size, and timeout ceilings.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`ExecutionLimits`] is captured from configuration when an execution
//! starts and never changes afterwards. The defaults match the documented
//! configuration defaults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum number of underlying requests per execution.
pub const DEFAULT_MAX_REQUESTS: u32 = 10;
/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default ceiling for caller-requested timeouts.
pub const DEFAULT_MAX_TIMEOUT: Duration = Duration::from_secs(30);
/// Default maximum response body size in bytes.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1_048_576;
/// Default maximum request body size in bytes.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 524_288;
/// Smallest effective timeout after normalization.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// SECTION: Types
// ============================================================================

/// Quotas applied to one execution.
///
/// # Invariants
/// - `default_timeout <= max_timeout` when produced by validated config.
/// - Values are copied into the context and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Maximum underlying attempts (retries included).
    pub max_requests: u32,
    /// Maximum request body size in bytes.
    pub max_request_bytes: usize,
    /// Maximum response body size in bytes.
    pub max_response_bytes: usize,
    /// Timeout used when the caller supplies none.
    pub default_timeout: Duration,
    /// Upper bound for caller-supplied timeouts.
    pub max_timeout: Duration,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            default_timeout: DEFAULT_TIMEOUT,
            max_timeout: DEFAULT_MAX_TIMEOUT,
        }
    }
}
