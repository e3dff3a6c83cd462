// crates/sandbox-egress/src/transport.rs
// ============================================================================
// Module: Reqwest Transport
// Description: Blocking HTTP transport over a shared reqwest client.
// Purpose: Dispatch validated requests with redirects disabled.
// Dependencies: reqwest, sandbox-egress-config, sandbox-egress-core
// ============================================================================

//! ## Overview
//! [`ReqwestTransport`] is the production [`Transport`]. It holds one shared
//! client whose connection pool is reused across executions and tenants.
//! Headers are built per request and never stored on the client. Redirects are
//! never followed; a 3xx response is handed back as-is.
//!
//! Security posture: with `pin_dns` enabled the client for a domain host is
//! rebuilt per attempt so it only connects to the validated addresses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::net::SocketAddr;

use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;
use sandbox_egress_config::TransportConfig;
use sandbox_egress_core::OutboundRequest;
use sandbox_egress_core::Transport;
use sandbox_egress_core::TransportError;
use sandbox_egress_core::TransportResponse;

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Production transport backed by a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    /// Shared client (connection pool).
    client: Client,
    /// User agent applied to every client.
    user_agent: String,
    /// Rebuild the client per attempt, pinned to validated addresses.
    pin_dns: bool,
}

impl ReqwestTransport {
    /// Builds a transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] when the client cannot be built.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = build_client(&config.user_agent, None)?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            pin_dns: config.pin_dns,
        })
    }

    /// Returns the client to use for a request.
    fn client_for(&self, request: &OutboundRequest) -> Result<Client, TransportError> {
        let is_domain = request.host.parse::<IpAddr>().is_err();
        if !self.pin_dns || !is_domain || request.validated_addrs.is_empty() {
            return Ok(self.client.clone());
        }
        let pinned = (request.host.as_str(), request.validated_addrs.as_slice());
        build_client(&self.user_agent, Some(pinned))
    }
}

impl Transport for ReqwestTransport {
    fn dispatch(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        let client = self.client_for(request)?;
        let response = prepare(&client, request)?.send().map_err(|err| classify(&err))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let content_length = response.content_length();
        Ok(TransportResponse {
            status,
            headers,
            content_length,
            body: Box::new(response),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the reqwest request for one attempt.
fn prepare(client: &Client, request: &OutboundRequest) -> Result<RequestBuilder, TransportError> {
    let method = Method::from_bytes(request.method.as_str().as_bytes())
        .map_err(|_| TransportError::Request("unsupported method".to_string()))?;
    let mut headers = HeaderMap::with_capacity(request.headers.len());
    for header in &request.headers {
        let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|_| {
            TransportError::Request(format!("invalid header name: {}", header.name))
        })?;
        let mut value = HeaderValue::from_str(&header.value).map_err(|_| {
            TransportError::Request(format!("invalid value for header: {}", header.name))
        })?;
        value.set_sensitive(header.sensitive);
        headers.append(name, value);
    }
    let mut builder =
        client.request(method, request.url.as_str()).headers(headers).timeout(request.timeout);
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }
    Ok(builder)
}

/// Builds a client with redirects disabled and optional address pinning.
fn build_client(
    user_agent: &str,
    pinned: Option<(&str, &[SocketAddr])>,
) -> Result<Client, TransportError> {
    let mut builder = Client::builder().user_agent(user_agent).redirect(Policy::none());
    if let Some((host, addrs)) = pinned {
        builder = builder.resolve_to_addrs(host, addrs);
    }
    builder.build().map_err(|_| TransportError::Request("http client build failed".to_string()))
}

/// Classifies reqwest failures by the phase they happened in.
fn classify(err: &reqwest::Error) -> TransportError {
    if err.is_connect() {
        if err.is_timeout() {
            return TransportError::ConnectTimeout;
        }
        return TransportError::Connect;
    }
    if err.is_timeout() {
        return TransportError::ReadTimeout;
    }
    if err.is_builder() {
        return TransportError::Request("request could not be built".to_string());
    }
    TransportError::Other
}
