// crates/sandbox-egress-core/src/core/mod.rs
// ============================================================================
// Module: Sandbox Egress Core Types
// Description: Canonical egress data model and error taxonomy.
// Purpose: Provide the value types passed between egress components.
// Dependencies: serde, serde_json, thiserror, base64
// ============================================================================

//! ## Overview
//! Core types are plain data holders. Components receive the
//! [`ExecutionContext`] explicitly instead of owning hidden state, which keeps
//! quota counters and the credential cache inspectable in tests.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod context;
pub mod credentials;
pub mod error;
pub mod identifiers;
pub mod limits;
pub mod record;
pub mod request;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use context::ExecutionContext;
pub use credentials::CredentialDescriptor;
pub use credentials::CredentialKind;
pub use credentials::HeaderSet;
pub use credentials::SecretValue;
pub use error::EgressError;
pub use error::EgressErrorKind;
pub use identifiers::CredentialName;
pub use identifiers::TenantId;
pub use limits::DEFAULT_MAX_REQUEST_BYTES;
pub use limits::DEFAULT_MAX_REQUESTS;
pub use limits::DEFAULT_MAX_RESPONSE_BYTES;
pub use limits::DEFAULT_MAX_TIMEOUT;
pub use limits::DEFAULT_TIMEOUT;
pub use limits::ExecutionLimits;
pub use limits::MIN_TIMEOUT;
pub use record::ResultRecord;
pub use request::HttpMethod;
pub use request::RequestBody;
pub use request::RequestOptions;
pub use request::RequestSpec;
