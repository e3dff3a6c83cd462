// crates/sandbox-egress/src/facade.rs
// ============================================================================
// Module: Egress Facade
// Description: Verb methods exposed to user scripts.
// Purpose: Compose validation, quota, credentials, retry, and translation.
// Dependencies: sandbox-egress-core, time, url
// ============================================================================

//! ## Overview
//! [`EgressFacade`] is the only egress object a script can reach. Each verb
//! builds a [`RequestSpec`], checks it once up front, then runs the retry
//! loop. Every attempt re-validates the destination and reserves quota before
//! dispatch. Responses are size-capped while streaming and returned as a
//! [`ResultRecord`] that owns no transport or credential state.
//!
//! Security posture: caller headers cannot override credential headers or
//! hop-by-hop framing headers; redirects are returned, never followed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;
use std::time::Instant;

use sandbox_egress_core::EgressError;
use sandbox_egress_core::ExecutionContext;
use sandbox_egress_core::HeaderSet;
use sandbox_egress_core::HttpMethod;
use sandbox_egress_core::OutboundHeader;
use sandbox_egress_core::OutboundRequest;
use sandbox_egress_core::RequestBody;
use sandbox_egress_core::RequestOptions;
use sandbox_egress_core::RequestSpec;
use sandbox_egress_core::ResultRecord;
use sandbox_egress_core::TransportError;
use time::OffsetDateTime;
use url::Url;

use crate::audit::EgressLogEvent;
use crate::audit::EgressLogEventParams;
use crate::audit::redact_url;
use crate::governor;
use crate::retry::AttemptFailure;
use crate::retry::AttemptOutcome;
use crate::retry::RetryFailure;
use crate::retry::RetryOutcome;
use crate::retry::is_retryable_status;
use crate::retry::parse_retry_after;
use crate::runtime::EgressRuntime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Caller headers that are silently dropped.
const BLOCKED_HEADERS: [&str; 4] = ["host", "transfer-encoding", "content-length", "connection"];
/// Log label for URLs that do not parse.
const INVALID_URL_LABEL: &str = "<invalid url>";

// ============================================================================
// SECTION: Facade
// ============================================================================

/// Per-execution HTTP capability.
///
/// # Invariants
/// - Owns exactly one [`ExecutionContext`] for its lifetime.
/// - Calls are strictly sequential; quota is cumulative across calls.
pub struct EgressFacade {
    /// Shared wiring.
    runtime: EgressRuntime,
    /// Per-execution state.
    context: ExecutionContext,
}

impl EgressFacade {
    /// Creates a facade over a runtime and a fresh context.
    pub(crate) const fn new(runtime: EgressRuntime, context: ExecutionContext) -> Self {
        Self {
            runtime,
            context,
        }
    }

    /// Returns the execution context.
    #[must_use]
    pub const fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Consumes the facade and returns its context.
    #[must_use]
    pub fn into_context(self) -> ExecutionContext {
        self.context
    }

    /// Issues a GET request.
    ///
    /// # Errors
    ///
    /// Returns [`EgressError`] when the request fails; see [`Self::execute`].
    pub fn get(&mut self, url: &str, options: RequestOptions) -> Result<ResultRecord, EgressError> {
        self.request(HttpMethod::Get, url, options)
    }

    /// Issues a POST request.
    ///
    /// # Errors
    ///
    /// Returns [`EgressError`] when the request fails; see [`Self::execute`].
    pub fn post(
        &mut self,
        url: &str,
        options: RequestOptions,
    ) -> Result<ResultRecord, EgressError> {
        self.request(HttpMethod::Post, url, options)
    }

    /// Issues a PUT request.
    ///
    /// # Errors
    ///
    /// Returns [`EgressError`] when the request fails; see [`Self::execute`].
    pub fn put(&mut self, url: &str, options: RequestOptions) -> Result<ResultRecord, EgressError> {
        self.request(HttpMethod::Put, url, options)
    }

    /// Issues a PATCH request.
    ///
    /// # Errors
    ///
    /// Returns [`EgressError`] when the request fails; see [`Self::execute`].
    pub fn patch(
        &mut self,
        url: &str,
        options: RequestOptions,
    ) -> Result<ResultRecord, EgressError> {
        self.request(HttpMethod::Patch, url, options)
    }

    /// Issues a DELETE request.
    ///
    /// # Errors
    ///
    /// Returns [`EgressError`] when the request fails; see [`Self::execute`].
    pub fn delete(
        &mut self,
        url: &str,
        options: RequestOptions,
    ) -> Result<ResultRecord, EgressError> {
        self.request(HttpMethod::Delete, url, options)
    }

    /// Issues a request with any supported method.
    ///
    /// # Errors
    ///
    /// Returns [`EgressError::InvalidRequest`] when both `json` and `data` are
    /// supplied, otherwise see [`Self::execute`].
    pub fn request(
        &mut self,
        method: HttpMethod,
        url: &str,
        options: RequestOptions,
    ) -> Result<ResultRecord, EgressError> {
        match RequestSpec::from_options(method, url, options) {
            Ok(spec) => self.execute(spec),
            Err(error) => {
                let trace = CallTrace::new(method, url_label(url));
                self.record(&trace, Instant::now(), Err(&error));
                Err(error)
            }
        }
    }

    /// Runs one logical request through validation, quota, and retries.
    ///
    /// # Errors
    ///
    /// - [`EgressError::InvalidRequest`] for malformed inputs.
    /// - [`EgressError::InvalidDestination`] when any attempt fails policy.
    /// - [`EgressError::RequestTooLarge`] before any dispatch.
    /// - [`EgressError::AuthProvider`] when the credential cannot be resolved.
    /// - [`EgressError::RequestLimitExceeded`] when quota runs out.
    /// - [`EgressError::ResponseTooLarge`] when the body passes the ceiling.
    /// - [`EgressError::Connection`] / [`EgressError::Timeout`] after the
    ///   retry budget is spent.
    pub fn execute(&mut self, spec: RequestSpec) -> Result<ResultRecord, EgressError> {
        let started = Instant::now();
        let mut trace = CallTrace::new(spec.method, url_label(&spec.url));
        let result = self.run(spec, &mut trace);
        self.record(&trace, started, result.as_ref());
        result
    }

    /// Request pipeline behind [`Self::execute`].
    fn run(&mut self, spec: RequestSpec, trace: &mut CallTrace) -> Result<ResultRecord, EgressError> {
        if spec.body.is_some() && !method_accepts_body(spec.method) {
            return Err(EgressError::InvalidRequest(format!(
                "{} requests do not accept a body",
                spec.method
            )));
        }
        let url = build_url(&spec.url, &spec.params)?;
        trace.url = redact_url(&url);
        self.runtime.validator.check_url(&url)?;

        let (caller_headers, dropped) = sanitize_headers(&spec.headers)?;
        trace.dropped_headers = dropped;

        let body = spec.body.as_ref().map(RequestBody::to_bytes).transpose()?;
        let body_len = body.as_ref().map_or(0, Vec::len);
        trace.request_bytes = body_len;
        governor::check_request_body(&self.context, body_len)?;

        let credentials = self.runtime.credentials.resolve(&mut self.context, spec.auth.as_ref())?;
        let content_type = spec.body.as_ref().and_then(RequestBody::implied_content_type);
        let prepared = PreparedRequest {
            method: spec.method,
            headers: merge_headers(caller_headers, content_type, &credentials),
            body,
            timeout: governor::effective_timeout(self.context.limits(), spec.timeout),
            max_response_bytes: self.context.limits().max_response_bytes,
            url,
        };

        let runtime = &self.runtime;
        let outcome = runtime
            .retry
            .execute(&mut self.context, |ctx, _attempt| attempt(runtime, ctx, &prepared, trace));
        match outcome {
            Ok(RetryOutcome {
                value,
                attempts,
            }) => {
                trace.attempts = attempts;
                Ok(value)
            }
            Err(RetryFailure {
                error,
                attempts,
            }) => {
                trace.attempts = attempts;
                Err(error)
            }
        }
    }

    /// Emits the log event for one logical request.
    fn record(
        &self,
        trace: &CallTrace,
        started: Instant,
        result: Result<&ResultRecord, &EgressError>,
    ) {
        let error_kind = result.err().map(EgressError::kind);
        let event = EgressLogEvent::new(EgressLogEventParams {
            tenant: self.context.tenant().cloned(),
            method: trace.method,
            url: trace.url.clone(),
            status: trace.status,
            error_kind,
            attempts: trace.attempts,
            request_bytes: trace.request_bytes,
            response_bytes: trace.response_bytes,
            duration_ms: started.elapsed().as_millis(),
            dropped_headers: trace.dropped_headers.clone(),
        });
        self.runtime.log_sink.record(&event);
    }
}

// ============================================================================
// SECTION: Attempts
// ============================================================================

/// Per-call values shared by every attempt.
struct PreparedRequest {
    /// HTTP method.
    method: HttpMethod,
    /// Final URL with query parameters.
    url: Url,
    /// Merged headers.
    headers: Vec<OutboundHeader>,
    /// Serialized body.
    body: Option<Vec<u8>>,
    /// Per-attempt timeout.
    timeout: Duration,
    /// Response ceiling.
    max_response_bytes: usize,
}

/// Facts collected for the log event.
struct CallTrace {
    /// HTTP method.
    method: HttpMethod,
    /// Redacted URL.
    url: String,
    /// Attempts made.
    attempts: u32,
    /// Last status seen.
    status: Option<u16>,
    /// Request body bytes.
    request_bytes: usize,
    /// Last response body bytes.
    response_bytes: usize,
    /// Dropped caller header names.
    dropped_headers: Vec<String>,
}

impl CallTrace {
    /// Starts a trace.
    const fn new(method: HttpMethod, url: String) -> Self {
        Self {
            method,
            url,
            attempts: 0,
            status: None,
            request_bytes: 0,
            response_bytes: 0,
            dropped_headers: Vec::new(),
        }
    }
}

/// Runs a single attempt: validate, reserve, dispatch, read.
fn attempt(
    runtime: &EgressRuntime,
    ctx: &mut ExecutionContext,
    prepared: &PreparedRequest,
    trace: &mut CallTrace,
) -> Result<AttemptOutcome<ResultRecord>, AttemptFailure> {
    let validated = runtime.validator.validate(&prepared.url).map_err(AttemptFailure::Fatal)?;
    governor::reserve(ctx).map_err(AttemptFailure::Fatal)?;
    let request = OutboundRequest {
        method: prepared.method,
        url: prepared.url.to_string(),
        host: validated.host.clone(),
        validated_addrs: validated.socket_addrs(),
        headers: prepared.headers.clone(),
        body: prepared.body.clone(),
        timeout: prepared.timeout,
    };
    ctx.add_request_bytes(byte_count(prepared.body.as_ref().map_or(0, Vec::len)));

    let mut response = runtime.transport.dispatch(&request).map_err(|err| {
        let mapped = map_transport_error(&err);
        if err.is_retryable() {
            AttemptFailure::Retryable(mapped)
        } else {
            AttemptFailure::Fatal(mapped)
        }
    })?;
    trace.status = Some(response.status);
    let retry_after = is_retryable_status(response.status).then(|| {
        response
            .header("retry-after")
            .and_then(|value| parse_retry_after(value, OffsetDateTime::now_utc()))
    });
    let body = governor::cap_streaming_read(
        response.body.as_mut(),
        response.content_length,
        prepared.max_response_bytes,
    )
    .map_err(AttemptFailure::Fatal)?;
    ctx.add_response_bytes(byte_count(body.len()));
    trace.response_bytes = body.len();

    let record = ResultRecord::new(response.status, &response.headers, &body);
    Ok(match retry_after {
        Some(retry_after) => AttemptOutcome::RetryableStatus {
            value: record,
            retry_after,
        },
        None => AttemptOutcome::Complete(record),
    })
}

/// Maps transport failures onto fixed, secret-free messages.
fn map_transport_error(err: &TransportError) -> EgressError {
    match err {
        TransportError::Connect => EgressError::Connection("connection failed".to_string()),
        TransportError::ConnectTimeout => EgressError::Timeout("connect timed out".to_string()),
        TransportError::ReadTimeout => EgressError::Timeout("request timed out".to_string()),
        TransportError::Request(message) => EgressError::InvalidRequest(message.clone()),
        TransportError::Other => EgressError::Connection("transport failure".to_string()),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when the method may carry a body.
const fn method_accepts_body(method: HttpMethod) -> bool {
    matches!(method, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
}

/// Parses the URL and appends query parameters.
fn build_url(raw: &str, params: &[(String, String)]) -> Result<Url, EgressError> {
    let mut url =
        Url::parse(raw).map_err(|_| EgressError::InvalidRequest("url is not valid".to_string()))?;
    if !params.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(name, value)| (name.as_str(), value.as_str())));
    }
    Ok(url)
}

/// Renders a raw URL for logs.
fn url_label(raw: &str) -> String {
    Url::parse(raw).map_or_else(|_| INVALID_URL_LABEL.to_string(), |url| redact_url(&url))
}

/// Lower-cases caller headers, drops blocked names, and rejects malformed ones.
///
/// Returns the kept headers and the dropped names.
fn sanitize_headers(
    headers: &[(String, String)],
) -> Result<(Vec<(String, String)>, Vec<String>), EgressError> {
    let mut kept = Vec::with_capacity(headers.len());
    let mut dropped = Vec::new();
    for (name, value) in headers {
        let name = name.trim().to_ascii_lowercase();
        if !is_header_token(&name) {
            return Err(EgressError::InvalidRequest("invalid header name".to_string()));
        }
        if !is_header_value(value) {
            return Err(EgressError::InvalidRequest(format!("invalid value for header: {name}")));
        }
        if BLOCKED_HEADERS.contains(&name.as_str()) {
            if !dropped.contains(&name) {
                dropped.push(name);
            }
            continue;
        }
        kept.push((name, value.clone()));
    }
    Ok((kept, dropped))
}

/// Rejects control bytes other than horizontal tab.
fn is_header_value(value: &str) -> bool {
    value.bytes().all(|byte| byte == b'\t' || (byte >= 0x20 && byte != 0x7f))
}

/// Returns true for RFC 9110 token strings.
fn is_header_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|byte| {
            byte.is_ascii_alphanumeric()
                || matches!(
                    byte,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

/// Merges caller, content-type, and credential headers.
///
/// Credential headers replace caller headers of the same name.
fn merge_headers(
    caller: Vec<(String, String)>,
    content_type: Option<&'static str>,
    credentials: &HeaderSet,
) -> Vec<OutboundHeader> {
    let mut merged: Vec<OutboundHeader> = caller
        .into_iter()
        .filter(|(name, _)| !credentials.contains(name))
        .map(|(name, value)| OutboundHeader {
            name,
            value,
            sensitive: false,
        })
        .collect();
    if let Some(content_type) = content_type
        && !merged.iter().any(|header| header.name == "content-type")
        && !credentials.contains("content-type")
    {
        merged.push(OutboundHeader {
            name: "content-type".to_string(),
            value: content_type.to_string(),
            sensitive: false,
        });
    }
    merged.extend(credentials.iter().map(|(name, value)| OutboundHeader {
        name: name.to_string(),
        value: value.expose().to_string(),
        sensitive: true,
    }));
    merged
}

/// Converts a byte length for the context counters.
fn byte_count(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
