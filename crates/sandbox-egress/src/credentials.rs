// crates/sandbox-egress/src/credentials.rs
// ============================================================================
// Module: Credential Resolver
// Description: Tenant-scoped credential lookup with a per-execution cache.
// Purpose: Turn credential names into auth headers without exposing secrets.
// Dependencies: sandbox-egress-core
// ============================================================================

//! ## Overview
//! [`CredentialResolver`] maps a credential name to auth headers for the
//! tenant that owns the execution. Results are cached in the
//! [`ExecutionContext`], so one execution never sees a credential change
//! mid-run. Error messages may name credentials but never carry secret
//! material. A failed lookup lists only the calling tenant's names.
//!
//! Security posture: credential names come from user scripts and are
//! untrusted; secrets never leave the header set they are resolved into.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::RwLock;

use sandbox_egress_core::CredentialDescriptor;
use sandbox_egress_core::CredentialName;
use sandbox_egress_core::CredentialStore;
use sandbox_egress_core::CredentialStoreError;
use sandbox_egress_core::EgressError;
use sandbox_egress_core::ExecutionContext;
use sandbox_egress_core::HeaderSet;
use sandbox_egress_core::TenantId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum credential name length echoed back in error messages.
const MAX_CREDENTIAL_NAME_LENGTH: usize = 128;

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolves credential names for the execution's tenant.
#[derive(Clone)]
pub struct CredentialResolver {
    /// Backing credential store.
    store: Arc<dyn CredentialStore>,
}

impl CredentialResolver {
    /// Creates a resolver over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
        }
    }

    /// Resolves auth headers for an optional credential name.
    ///
    /// No name yields an empty header set. Cached names are served from the
    /// context without touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`EgressError::AuthProvider`] when the context has no tenant,
    /// the name is unknown to the tenant, or the store fails.
    pub fn resolve(
        &self,
        ctx: &mut ExecutionContext,
        name: Option<&CredentialName>,
    ) -> Result<HeaderSet, EgressError> {
        let Some(name) = name else {
            return Ok(HeaderSet::new());
        };
        validate_name(name)?;
        if let Some(cached) = ctx.cached_credentials(name) {
            return Ok(cached.clone());
        }
        let tenant = ctx.tenant().cloned().ok_or_else(|| {
            EgressError::AuthProvider("credentials not available in this context".to_string())
        })?;
        let descriptor = self.store.lookup(&tenant, name).map_err(|_| store_unavailable())?;
        let Some(descriptor) = descriptor else {
            return Err(self.not_found(&tenant, name));
        };
        let headers = descriptor.to_headers();
        Ok(ctx.cache_credentials(name.clone(), headers).clone())
    }

    /// Builds the not-found error listing the tenant's credential names.
    fn not_found(&self, tenant: &TenantId, name: &CredentialName) -> EgressError {
        let Ok(mut names) = self.store.list_names(tenant) else {
            return EgressError::AuthProvider(format!("credential \"{name}\" not found"));
        };
        names.sort();
        names.dedup();
        let available = if names.is_empty() {
            "none".to_string()
        } else {
            names.iter().map(CredentialName::as_str).collect::<Vec<_>>().join(", ")
        };
        EgressError::AuthProvider(format!(
            "credential \"{name}\" not found; available credentials: {available}"
        ))
    }
}

/// Rejects names that cannot be echoed safely.
fn validate_name(name: &CredentialName) -> Result<(), EgressError> {
    let raw = name.as_str();
    if raw.trim().is_empty() {
        return Err(EgressError::AuthProvider("credential name must be non-empty".to_string()));
    }
    if raw.len() > MAX_CREDENTIAL_NAME_LENGTH || raw.chars().any(char::is_control) {
        return Err(EgressError::AuthProvider("credential name is not valid".to_string()));
    }
    Ok(())
}

/// Generic store failure surfaced to scripts.
fn store_unavailable() -> EgressError {
    EgressError::AuthProvider("credential store unavailable".to_string())
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Credential map keyed by tenant.
type TenantCredentials = BTreeMap<TenantId, BTreeMap<CredentialName, CredentialDescriptor>>;

/// In-memory credential store for embedding and tests.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    /// Descriptors keyed by tenant, then credential name.
    entries: RwLock<TenantCredentials>,
}

impl InMemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a credential and returns the store.
    #[must_use]
    pub fn with_credential(self, tenant: TenantId, descriptor: CredentialDescriptor) -> Self {
        if let Ok(mut guard) = self.entries.write() {
            guard.entry(tenant).or_default().insert(descriptor.name.clone(), descriptor);
        }
        self
    }

    /// Adds or replaces a credential.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialStoreError::Unavailable`] when the lock is poisoned.
    pub fn insert(
        &self,
        tenant: TenantId,
        descriptor: CredentialDescriptor,
    ) -> Result<(), CredentialStoreError> {
        let mut guard = self.entries.write().map_err(|_| poisoned())?;
        guard.entry(tenant).or_default().insert(descriptor.name.clone(), descriptor);
        drop(guard);
        Ok(())
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn lookup(
        &self,
        tenant: &TenantId,
        name: &CredentialName,
    ) -> Result<Option<CredentialDescriptor>, CredentialStoreError> {
        let guard = self.entries.read().map_err(|_| poisoned())?;
        Ok(guard.get(tenant).and_then(|creds| creds.get(name)).cloned())
    }

    fn list_names(&self, tenant: &TenantId) -> Result<Vec<CredentialName>, CredentialStoreError> {
        let guard = self.entries.read().map_err(|_| poisoned())?;
        Ok(guard.get(tenant).map(|creds| creds.keys().cloned().collect()).unwrap_or_default())
    }
}

/// Lock poisoning error.
fn poisoned() -> CredentialStoreError {
    CredentialStoreError::Unavailable("credential map lock poisoned".to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
