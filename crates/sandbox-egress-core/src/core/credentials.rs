// crates/sandbox-egress-core/src/core/credentials.rs
// ============================================================================
// Module: Credential Model
// Description: Credential kinds, secret wrappers, and resolved header sets.
// Purpose: Convert tenant-scoped descriptors into request headers safely.
// Dependencies: base64
// ============================================================================

//! ## Overview
//! Credential kinds form a small closed set. Each kind has exactly one
//! conversion into a [`HeaderSet`]. Secret material is held in
//! [`SecretValue`], whose `Debug` output is redacted and which has no
//! `Display` implementation.
//!
//! Security posture: header sets are cached per execution only and must never
//! be logged or returned to user code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::core::identifiers::CredentialName;

// ============================================================================
// SECTION: Secret Values
// ============================================================================

/// Secret string that never appears in formatted output.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    /// Wraps a secret string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Exposes the raw secret for attaching to an outbound request.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Header Sets
// ============================================================================

/// Ordered set of resolved credential headers.
///
/// # Invariants
/// - Header names are stored lower-cased and are unique.
/// - Values are secret and redacted from `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    /// Lower-cased header names paired with secret values.
    entries: Vec<(String, SecretValue)>,
}

impl HeaderSet {
    /// Creates an empty header set (anonymous request).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Inserts a header, replacing any existing header with the same name.
    pub fn insert(&mut self, name: &str, value: SecretValue) {
        let name = name.trim().to_ascii_lowercase();
        if let Some(entry) = self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Returns true when a header with the given name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }

    /// Returns the secret value for a header name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SecretValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Iterates over header names and secret values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SecretValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no headers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for HeaderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(name, _)| name)).finish()
    }
}

// ============================================================================
// SECTION: Credential Kinds
// ============================================================================

/// Supported credential kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialKind {
    /// HTTP basic authentication.
    Basic {
        /// Account name.
        username: String,
        /// Account password.
        password: SecretValue,
    },
    /// Bearer token in the `authorization` header.
    Bearer {
        /// Token value.
        token: SecretValue,
    },
    /// API key carried in a named header.
    HeaderKey {
        /// Header that carries the key.
        header: String,
        /// Key value.
        key: SecretValue,
    },
    /// Username and key joined in one `authorization: ApiKey user:key` header.
    ApiKey {
        /// Account name.
        username: String,
        /// Key value.
        key: SecretValue,
    },
    /// Username and key carried in two named headers.
    Composite {
        /// Header that carries the username.
        username_header: String,
        /// Username value.
        username: String,
        /// Header that carries the key.
        key_header: String,
        /// Key value.
        key: SecretValue,
    },
}

impl CredentialKind {
    /// Converts the credential into request headers.
    #[must_use]
    pub fn to_headers(&self) -> HeaderSet {
        let mut headers = HeaderSet::new();
        match self {
            Self::Basic {
                username,
                password,
            } => {
                let encoded = STANDARD.encode(format!("{username}:{}", password.expose()));
                headers.insert("authorization", SecretValue::new(format!("Basic {encoded}")));
            }
            Self::Bearer {
                token,
            } => {
                headers.insert("authorization", SecretValue::new(format!("Bearer {}", token.expose())));
            }
            Self::HeaderKey {
                header,
                key,
            } => {
                headers.insert(header, key.clone());
            }
            Self::ApiKey {
                username,
                key,
            } => {
                headers.insert(
                    "authorization",
                    SecretValue::new(format!("ApiKey {username}:{}", key.expose())),
                );
            }
            Self::Composite {
                username_header,
                username,
                key_header,
                key,
            } => {
                headers.insert(username_header, SecretValue::new(username.clone()));
                headers.insert(key_header, key.clone());
            }
        }
        headers
    }

    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Basic {
                ..
            } => "basic",
            Self::Bearer {
                ..
            } => "bearer",
            Self::HeaderKey {
                ..
            } => "header_key",
            Self::ApiKey {
                ..
            } => "api_key",
            Self::Composite {
                ..
            } => "composite",
        }
    }
}

/// Named, tenant-scoped credential record owned by the credential store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDescriptor {
    /// Credential name as referenced by user code.
    pub name: CredentialName,
    /// Credential kind and secret material.
    pub kind: CredentialKind,
}

impl CredentialDescriptor {
    /// Creates a new descriptor.
    #[must_use]
    pub const fn new(name: CredentialName, kind: CredentialKind) -> Self {
        Self {
            name,
            kind,
        }
    }

    /// Converts the descriptor into request headers.
    #[must_use]
    pub fn to_headers(&self) -> HeaderSet {
        self.kind.to_headers()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    #[test]
    fn basic_credentials_encode_username_and_password() {
        let kind = CredentialKind::Basic {
            username: "user".to_string(),
            password: SecretValue::new("pass"),
        };
        let headers = kind.to_headers();
        assert_eq!(headers.get("Authorization").unwrap().expose(), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn api_key_credentials_join_username_and_key() {
        let kind = CredentialKind::ApiKey {
            username: "svc".to_string(),
            key: SecretValue::new("k-123"),
        };
        let headers = kind.to_headers();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("authorization").unwrap().expose(), "ApiKey svc:k-123");
        assert_eq!(kind.as_str(), "api_key");
    }

    #[test]
    fn composite_credentials_produce_two_headers() {
        let kind = CredentialKind::Composite {
            username_header: "X-Api-User".to_string(),
            username: "svc".to_string(),
            key_header: "X-Api-Key".to_string(),
            key: SecretValue::new("k-123"),
        };
        let headers = kind.to_headers();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("x-api-user").unwrap().expose(), "svc");
        assert_eq!(headers.get("x-api-key").unwrap().expose(), "k-123");
    }

    #[test]
    fn header_set_debug_omits_values() {
        let kind = CredentialKind::Bearer {
            token: SecretValue::new("super-secret-token"),
        };
        let rendered = format!("{:?} {:?}", kind.to_headers(), kind);
        assert!(rendered.contains("authorization"));
        assert!(!rendered.contains("super-secret-token"));
    }
}
