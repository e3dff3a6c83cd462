// crates/sandbox-egress-core/src/core/record.rs
// ============================================================================
// Module: Result Record
// Description: Sanitized, capability-free response returned to user code.
// Purpose: Translate transport responses into plain data.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`ResultRecord`] is the only artifact user code receives. It owns copies of
//! the status, lower-cased headers, and body, and holds no reference to the
//! transport connection or to credential material.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Result Record
// ============================================================================

/// Immutable response record.
///
/// # Invariants
/// - Header names are lower-cased; repeated headers are joined with `", "`.
/// - `is_success` is true exactly for 2xx, `is_error` exactly for 4xx/5xx.
/// - `json` is `None` unless the body parses as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    /// HTTP status code.
    status_code: u16,
    /// Lower-cased response headers.
    headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8 (lossy).
    text: String,
    /// Parsed JSON body when the body is valid JSON.
    json: Option<Value>,
    /// True for 2xx responses.
    is_success: bool,
    /// True for 4xx and 5xx responses.
    is_error: bool,
}

impl ResultRecord {
    /// Builds a record from a status, raw headers, and a fully read body.
    #[must_use]
    pub fn new(status_code: u16, raw_headers: &[(String, String)], body: &[u8]) -> Self {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in raw_headers {
            let name = name.to_ascii_lowercase();
            headers
                .entry(name)
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.clone());
        }
        let text = String::from_utf8_lossy(body).into_owned();
        let json =
            if body.is_empty() { None } else { serde_json::from_slice::<Value>(body).ok() };
        Self {
            status_code,
            headers,
            text,
            json,
            is_success: (200..300).contains(&status_code),
            is_error: (400..600).contains(&status_code),
        }
    }

    /// Returns the HTTP status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Returns the lower-cased header map.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Returns a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Returns the body text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the parsed JSON body, if any.
    #[must_use]
    pub const fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Returns true for 2xx responses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.is_success
    }

    /// Returns true for 4xx and 5xx responses.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.is_error
    }

    /// Renders the record as the dictionary shape handed to scripts.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
