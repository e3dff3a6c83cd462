// crates/sandbox-egress-core/src/core/request.rs
// ============================================================================
// Module: Request Specification
// Description: Caller-facing request options and the validated request spec.
// Purpose: Capture one logical request before it enters the retry loop.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`RequestOptions`] mirrors the keyword arguments user code passes to a verb
//! method. [`RequestSpec::from_options`] turns them into an ephemeral spec and
//! rejects contradictory inputs, such as a JSON body and a raw body together.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::core::error::EgressError;
use crate::core::identifiers::CredentialName;

// ============================================================================
// SECTION: Methods
// ============================================================================

/// HTTP verbs exposed to user code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// PATCH.
    Patch,
    /// DELETE.
    Delete,
}

impl HttpMethod {
    /// Returns the canonical method token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Bodies
// ============================================================================

/// Request body in exactly one form.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON-shaped body, serialized before dispatch.
    Json(Value),
    /// Raw bytes sent as-is.
    Raw(Vec<u8>),
}

impl RequestBody {
    /// Serializes the body into wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EgressError::InvalidRequest`] when the JSON value cannot be
    /// serialized.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EgressError> {
        match self {
            Self::Json(value) => serde_json::to_vec(value)
                .map_err(|_| EgressError::InvalidRequest("json body is not serializable".to_string())),
            Self::Raw(bytes) => Ok(bytes.clone()),
        }
    }

    /// Returns the implied content type, if any.
    #[must_use]
    pub const fn implied_content_type(&self) -> Option<&'static str> {
        match self {
            Self::Json(_) => Some("application/json"),
            Self::Raw(_) => None,
        }
    }
}

// ============================================================================
// SECTION: Options
// ============================================================================

/// Optional inputs accepted by every verb method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Query parameters appended to the URL.
    pub params: Vec<(String, String)>,
    /// Caller-supplied headers.
    pub headers: Vec<(String, String)>,
    /// Credential name to resolve for this request.
    pub auth: Option<CredentialName>,
    /// JSON body (mutually exclusive with `data`).
    pub json: Option<Value>,
    /// Raw body (mutually exclusive with `json`).
    pub data: Option<Vec<u8>>,
    /// Per-attempt timeout override.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Adds a caller header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the credential name.
    #[must_use]
    pub fn auth(mut self, name: impl Into<CredentialName>) -> Self {
        self.auth = Some(name.into());
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn json(mut self, value: Value) -> Self {
        self.json = Some(value);
        self
    }

    /// Sets a raw body.
    #[must_use]
    pub fn data(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.data = Some(bytes.into());
        self
    }

    /// Sets the per-attempt timeout override.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// ============================================================================
// SECTION: Request Spec
// ============================================================================

/// One logical request, retained only for the duration of its retry loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    /// HTTP method.
    pub method: HttpMethod,
    /// URL as supplied by the caller.
    pub url: String,
    /// Query parameters appended to the URL.
    pub params: Vec<(String, String)>,
    /// Caller-supplied headers.
    pub headers: Vec<(String, String)>,
    /// Optional body.
    pub body: Option<RequestBody>,
    /// Optional credential reference.
    pub auth: Option<CredentialName>,
    /// Optional per-attempt timeout override.
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    /// Builds a spec from verb inputs.
    ///
    /// # Errors
    ///
    /// Returns [`EgressError::InvalidRequest`] when both `json` and `data`
    /// are supplied.
    pub fn from_options(
        method: HttpMethod,
        url: impl Into<String>,
        options: RequestOptions,
    ) -> Result<Self, EgressError> {
        let body = match (options.json, options.data) {
            (Some(_), Some(_)) => {
                return Err(EgressError::InvalidRequest(
                    "json and data bodies cannot be combined".to_string(),
                ));
            }
            (Some(value), None) => Some(RequestBody::Json(value)),
            (None, Some(bytes)) => Some(RequestBody::Raw(bytes)),
            (None, None) => None,
        };
        Ok(Self {
            method,
            url: url.into(),
            params: options.params,
            headers: options.headers,
            body,
            auth: options.auth,
            timeout: options.timeout,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
