// crates/sandbox-egress-core/src/core/context.rs
// ============================================================================
// Module: Execution Context
// Description: Per-execution quota counters and credential cache.
// Purpose: Hold all mutable egress state for exactly one script invocation.
// Dependencies: crate::core::{credentials, identifiers, limits}
// ============================================================================

//! ## Overview
//! One [`ExecutionContext`] exists per user-script invocation. It is created
//! right before the script runs and dropped right after, taking the credential
//! cache with it. Contexts share no mutable state with each other.
//!
//! Security posture: the credential cache is keyed by name only because the
//! context is bound to a single tenant for its whole life; it must never be
//! promoted to a process-wide cache.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use crate::core::credentials::HeaderSet;
use crate::core::identifiers::CredentialName;
use crate::core::identifiers::TenantId;
use crate::core::limits::ExecutionLimits;

// ============================================================================
// SECTION: Context
// ============================================================================

/// Mutable egress state for one execution.
///
/// # Invariants
/// - `requests_issued` starts at 0, only increases, and never exceeds
///   `limits.max_requests`.
/// - `credential_cache` holds at most one entry per credential name.
/// - `tenant` and `limits` are fixed at construction.
#[derive(Debug)]
pub struct ExecutionContext {
    /// Tenant the execution runs on behalf of, when known.
    tenant: Option<TenantId>,
    /// Underlying attempts issued so far (retries included).
    requests_issued: u32,
    /// Cumulative request body bytes dispatched.
    request_bytes: u64,
    /// Cumulative response body bytes read.
    response_bytes: u64,
    /// Resolved credential headers keyed by credential name.
    credential_cache: HashMap<CredentialName, HeaderSet>,
    /// Quota snapshot for this execution.
    limits: ExecutionLimits,
}

impl ExecutionContext {
    /// Creates a fresh context for a new execution.
    #[must_use]
    pub fn new(tenant: Option<TenantId>, limits: ExecutionLimits) -> Self {
        Self {
            tenant,
            requests_issued: 0,
            request_bytes: 0,
            response_bytes: 0,
            credential_cache: HashMap::new(),
            limits,
        }
    }

    /// Returns the tenant for this execution.
    #[must_use]
    pub const fn tenant(&self) -> Option<&TenantId> {
        self.tenant.as_ref()
    }

    /// Returns the quota snapshot.
    #[must_use]
    pub const fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Returns the number of underlying attempts issued so far.
    #[must_use]
    pub const fn requests_issued(&self) -> u32 {
        self.requests_issued
    }

    /// Returns how many attempts remain before the quota is exhausted.
    #[must_use]
    pub const fn requests_remaining(&self) -> u32 {
        self.limits.max_requests.saturating_sub(self.requests_issued)
    }

    /// Consumes one request slot, returning the new count.
    ///
    /// The check and the increment happen in one step; `None` means the
    /// quota is exhausted and the counter is unchanged.
    pub const fn try_consume_request(&mut self) -> Option<u32> {
        if self.requests_issued >= self.limits.max_requests {
            return None;
        }
        self.requests_issued += 1;
        Some(self.requests_issued)
    }

    /// Returns cumulative request body bytes dispatched.
    #[must_use]
    pub const fn request_bytes(&self) -> u64 {
        self.request_bytes
    }

    /// Returns cumulative response body bytes read.
    #[must_use]
    pub const fn response_bytes(&self) -> u64 {
        self.response_bytes
    }

    /// Adds dispatched request body bytes.
    pub const fn add_request_bytes(&mut self, bytes: u64) {
        self.request_bytes = self.request_bytes.saturating_add(bytes);
    }

    /// Adds read response body bytes.
    pub const fn add_response_bytes(&mut self, bytes: u64) {
        self.response_bytes = self.response_bytes.saturating_add(bytes);
    }

    /// Returns the cached header set for a credential name.
    #[must_use]
    pub fn cached_credentials(&self, name: &CredentialName) -> Option<&HeaderSet> {
        self.credential_cache.get(name)
    }

    /// Caches a resolved header set; an existing entry for the name is kept.
    pub fn cache_credentials(&mut self, name: CredentialName, headers: HeaderSet) -> &HeaderSet {
        self.credential_cache.entry(name).or_insert(headers)
    }

    /// Returns the number of cached credential entries.
    #[must_use]
    pub fn cached_credential_count(&self) -> usize {
        self.credential_cache.len()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
