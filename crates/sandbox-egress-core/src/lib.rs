// crates/sandbox-egress-core/src/lib.rs
// ============================================================================
// Module: Sandbox Egress Core Library
// Description: Public API surface for the sandbox egress core.
// Purpose: Expose per-execution state, value types, errors, and interfaces.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Sandbox egress core defines the data model shared by every egress
//! component: the per-execution [`ExecutionContext`], request and result
//! value objects, the tenant-scoped credential model, and the closed
//! [`EgressError`] taxonomy. Collaborators (transport, credential store, DNS
//! resolver, sleeper) are reached only through the traits in [`interfaces`].
//!
//! Security posture: everything crossing into this crate from user scripts is
//! untrusted; credential material is wrapped in [`SecretValue`] and never
//! formatted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::CredentialStore;
pub use interfaces::CredentialStoreError;
pub use interfaces::HostResolver;
pub use interfaces::OutboundHeader;
pub use interfaces::OutboundRequest;
pub use interfaces::Sleeper;
pub use interfaces::Transport;
pub use interfaces::TransportError;
pub use interfaces::TransportResponse;
