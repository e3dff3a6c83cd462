// crates/sandbox-egress/src/audit.rs
// ============================================================================
// Module: Egress Audit Logging
// Description: Structured, redacted events for every egress call.
// Purpose: Record outbound activity without leaking secrets or query values.
// Dependencies: sandbox-egress-config, sandbox-egress-core, serde, url
// ============================================================================

//! ## Overview
//! One [`EgressLogEvent`] is emitted per logical request, whatever the
//! outcome. Events carry the tenant, method, redacted URL, status, sizes,
//! attempt count, and error kind. They never carry header values or bodies.
//! Sinks write JSON lines and swallow their own I/O failures.
//!
//! Security posture: URLs are logged without userinfo, fragments, or query
//! values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use sandbox_egress_config::LogSinkKind;
use sandbox_egress_config::LoggingConfig;
use sandbox_egress_core::EgressErrorKind;
use sandbox_egress_core::HttpMethod;
use sandbox_egress_core::TenantId;
use serde::Serialize;
use url::Url;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Placeholder for redacted query values.
const REDACTED: &str = "REDACTED";

/// Outcome classification for an egress call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EgressOutcome {
    /// Response returned with a non-error status.
    Ok,
    /// Response returned with a 4xx or 5xx status.
    HttpError,
    /// No response returned; an error was raised.
    Error,
}

impl EgressOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::HttpError => "http_error",
            Self::Error => "error",
        }
    }
}

/// Egress event payload.
#[derive(Debug, Clone, Serialize)]
pub struct EgressLogEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Tenant identifier when the execution has one.
    pub tenant: Option<String>,
    /// HTTP method.
    pub method: HttpMethod,
    /// Redacted request URL.
    pub url: String,
    /// Final HTTP status when a response was returned.
    pub status: Option<u16>,
    /// Call outcome.
    pub outcome: EgressOutcome,
    /// Error kind when the call raised.
    pub error_kind: Option<EgressErrorKind>,
    /// Attempts made during the retry loop.
    pub attempts: u32,
    /// Attempts beyond the first.
    pub retries: u32,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Final response body size in bytes.
    pub response_bytes: usize,
    /// Wall-clock duration in milliseconds, waits included.
    pub duration_ms: u128,
    /// Caller header names that were dropped.
    pub dropped_headers: Vec<String>,
}

/// Inputs for constructing an [`EgressLogEvent`].
#[derive(Debug, Clone)]
pub struct EgressLogEventParams {
    /// Tenant identifier when the execution has one.
    pub tenant: Option<TenantId>,
    /// HTTP method.
    pub method: HttpMethod,
    /// Redacted request URL.
    pub url: String,
    /// Final HTTP status when a response was returned.
    pub status: Option<u16>,
    /// Error kind when the call raised.
    pub error_kind: Option<EgressErrorKind>,
    /// Attempts made.
    pub attempts: u32,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Final response body size in bytes.
    pub response_bytes: usize,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u128,
    /// Caller header names that were dropped.
    pub dropped_headers: Vec<String>,
}

impl EgressLogEvent {
    /// Creates a new event with a consistent timestamp.
    #[must_use]
    pub fn new(params: EgressLogEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        let outcome = match (params.error_kind, params.status) {
            (Some(_), _) => EgressOutcome::Error,
            (None, Some(status)) if status >= 400 => EgressOutcome::HttpError,
            (None, _) => EgressOutcome::Ok,
        };
        Self {
            event: "egress_request",
            timestamp_ms,
            tenant: params.tenant.map(|tenant| tenant.to_string()),
            method: params.method,
            url: params.url,
            status: params.status,
            outcome,
            error_kind: params.error_kind,
            attempts: params.attempts,
            retries: params.attempts.saturating_sub(1),
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
            duration_ms: params.duration_ms,
            dropped_headers: params.dropped_headers,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Egress event sink.
pub trait EgressLogSink: Send + Sync {
    /// Records an event.
    fn record(&self, event: &EgressLogEvent);
}

/// Sink that logs JSON lines to stderr.
pub struct StderrEgressLogSink;

impl EgressLogSink for StderrEgressLogSink {
    fn record(&self, event: &EgressLogEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Sink that appends JSON lines to a file.
pub struct FileEgressLogSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileEgressLogSink {
    /// Opens the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl EgressLogSink for FileEgressLogSink {
    fn record(&self, event: &EgressLogEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op sink.
pub struct NoopEgressLogSink;

impl EgressLogSink for NoopEgressLogSink {
    fn record(&self, _event: &EgressLogEvent) {}
}

/// Builds the sink selected by configuration.
///
/// # Errors
///
/// Returns an error when the file sink cannot open its path.
pub fn sink_from_config(config: &LoggingConfig) -> io::Result<Arc<dyn EgressLogSink>> {
    match (config.sink, &config.path) {
        (LogSinkKind::File, Some(path)) => Ok(Arc::new(FileEgressLogSink::new(path)?)),
        (LogSinkKind::File, None) => {
            Err(io::Error::new(io::ErrorKind::InvalidInput, "log file path required"))
        }
        (LogSinkKind::Stderr, _) => Ok(Arc::new(StderrEgressLogSink)),
        (LogSinkKind::None, _) => Ok(Arc::new(NoopEgressLogSink)),
    }
}

// ============================================================================
// SECTION: Redaction
// ============================================================================

/// Renders a URL for logs.
///
/// Userinfo and fragment are dropped; every query value becomes `REDACTED`
/// while parameter names are kept.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut redacted = url.clone();
    let _ = redacted.set_username("");
    let _ = redacted.set_password(None);
    redacted.set_fragment(None);
    let names: Vec<String> = url.query_pairs().map(|(name, _)| name.into_owned()).collect();
    if names.is_empty() {
        redacted.set_query(None);
    } else {
        redacted
            .query_pairs_mut()
            .clear()
            .extend_pairs(names.iter().map(|name| (name.as_str(), REDACTED)));
    }
    redacted.to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
