// crates/sandbox-egress-config/src/lib.rs
// ============================================================================
// Module: Sandbox Egress Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for sandbox-egress.toml semantics.
// Dependencies: sandbox-egress-core, serde, toml
// ============================================================================

//! ## Overview
//! `sandbox-egress-config` defines the configuration consumed when the egress
//! runtime is constructed. User scripts never see or modify it. Validation is
//! strict and fails closed.
//!
//! Security posture: config inputs are untrusted until validated.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
