// crates/sandbox-egress-config/src/config.rs
// ============================================================================
// Module: Sandbox Egress Configuration
// Description: Configuration loading and validation for the egress runtime.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: sandbox-egress-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has documented defaults, so an empty file is a valid
//! production configuration. Relaxations (cleartext HTTP, private networks)
//! are accepted only together with `dev.relaxed = true`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use sandbox_egress_core::DEFAULT_MAX_REQUEST_BYTES;
use sandbox_egress_core::DEFAULT_MAX_REQUESTS;
use sandbox_egress_core::DEFAULT_MAX_RESPONSE_BYTES;
use sandbox_egress_core::ExecutionLimits;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "sandbox-egress.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SANDBOX_EGRESS_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum allowed requests per execution.
pub(crate) const MAX_REQUESTS_CEILING: u32 = 1_000;
/// Minimum allowed timeout in milliseconds.
pub(crate) const MIN_TIMEOUT_MS: u64 = 1_000;
/// Maximum allowed timeout in milliseconds.
pub(crate) const MAX_TIMEOUT_CEILING_MS: u64 = 300_000;
/// Maximum allowed body ceiling in bytes.
pub(crate) const MAX_BODY_CEILING_BYTES: usize = 64 * 1024 * 1024;
/// Maximum allowed retry attempts.
pub(crate) const MAX_ATTEMPTS_CEILING: u32 = 10;
/// Maximum allowed retry wait in milliseconds.
pub(crate) const MAX_WAIT_CEILING_MS: u64 = 60_000;
/// Maximum allowed retry jitter in milliseconds.
pub(crate) const MAX_JITTER_CEILING_MS: u64 = 10_000;
/// Maximum number of host allow/deny entries.
pub(crate) const MAX_HOST_RULES: usize = 1_024;
/// Maximum length of a host pattern.
pub(crate) const MAX_HOST_PATTERN_LENGTH: usize = 253;
/// Maximum length of the user agent string.
pub(crate) const MAX_USER_AGENT_LENGTH: usize = 256;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Sandbox egress configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EgressConfig {
    /// Per-execution quotas.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Retry and backoff policy.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Destination (SSRF) policy.
    #[serde(default)]
    pub destination: DestinationConfig,
    /// Development-mode overrides (explicit opt-in only).
    #[serde(default)]
    pub dev: DevConfig,
    /// Outbound transport settings.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Egress log sink settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EgressConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;
        self.retry.validate()?;
        self.destination.validate(self.dev.relaxed)?;
        self.transport.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Returns the quota snapshot applied to each execution.
    #[must_use]
    pub const fn execution_limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            max_requests: self.limits.max_requests,
            max_request_bytes: self.limits.max_request_bytes,
            max_response_bytes: self.limits.max_response_bytes,
            default_timeout: Duration::from_millis(self.limits.default_timeout_ms),
            max_timeout: Duration::from_millis(self.limits.max_timeout_ms),
        }
    }

    /// Returns true when the relaxed development mode is enabled.
    #[must_use]
    pub const fn is_relaxed(&self) -> bool {
        self.dev.relaxed
    }
}

/// Per-execution quota configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum underlying requests per execution (retries included).
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Timeout applied when the caller supplies none, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Ceiling for caller-supplied timeouts, in milliseconds.
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,
    /// Maximum response body size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            default_timeout_ms: default_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

impl LimitsConfig {
    /// Validates quota bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 || self.max_requests > MAX_REQUESTS_CEILING {
            return Err(ConfigError::Invalid(format!(
                "limits.max_requests must be between 1 and {MAX_REQUESTS_CEILING}"
            )));
        }
        if self.default_timeout_ms < MIN_TIMEOUT_MS || self.max_timeout_ms < MIN_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "limits timeouts must be at least {MIN_TIMEOUT_MS} ms"
            )));
        }
        if self.max_timeout_ms > MAX_TIMEOUT_CEILING_MS {
            return Err(ConfigError::Invalid(format!(
                "limits.max_timeout_ms must not exceed {MAX_TIMEOUT_CEILING_MS}"
            )));
        }
        if self.default_timeout_ms > self.max_timeout_ms {
            return Err(ConfigError::Invalid(
                "limits.default_timeout_ms must not exceed limits.max_timeout_ms".to_string(),
            ));
        }
        validate_byte_ceiling("limits.max_response_bytes", self.max_response_bytes)?;
        validate_byte_ceiling("limits.max_request_bytes", self.max_request_bytes)?;
        Ok(())
    }
}

/// Retry and backoff configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts per logical request (initial attempt included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff wait in milliseconds.
    #[serde(default = "default_base_wait_ms")]
    pub base_wait_ms: u64,
    /// Maximum backoff wait in milliseconds.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// Maximum random jitter added to computed waits, in milliseconds.
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_wait_ms: default_base_wait_ms(),
            max_wait_ms: default_max_wait_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

impl RetryConfig {
    /// Validates retry bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_CEILING {
            return Err(ConfigError::Invalid(format!(
                "retry.max_attempts must be between 1 and {MAX_ATTEMPTS_CEILING}"
            )));
        }
        if self.max_wait_ms > MAX_WAIT_CEILING_MS {
            return Err(ConfigError::Invalid(format!(
                "retry.max_wait_ms must not exceed {MAX_WAIT_CEILING_MS}"
            )));
        }
        if self.base_wait_ms > self.max_wait_ms {
            return Err(ConfigError::Invalid(
                "retry.base_wait_ms must not exceed retry.max_wait_ms".to_string(),
            ));
        }
        if self.max_jitter_ms > MAX_JITTER_CEILING_MS {
            return Err(ConfigError::Invalid(format!(
                "retry.max_jitter_ms must not exceed {MAX_JITTER_CEILING_MS}"
            )));
        }
        Ok(())
    }
}

/// Destination validation policy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationConfig {
    /// Optional host allowlist (exact hosts or `*.suffix` patterns).
    #[serde(default)]
    pub allowed_hosts: Option<Vec<String>>,
    /// Host denylist, evaluated before the allowlist.
    #[serde(default)]
    pub denied_hosts: Vec<String>,
    /// Allow cleartext `http://` URLs (relaxed mode only).
    #[serde(default)]
    pub allow_http: bool,
    /// Allow private, loopback, and link-local targets (relaxed mode only).
    #[serde(default)]
    pub allow_private_networks: bool,
}

impl DestinationConfig {
    /// Validates destination policy against the dev mode.
    fn validate(&self, relaxed: bool) -> Result<(), ConfigError> {
        if self.allow_http && !relaxed {
            return Err(ConfigError::Invalid(
                "destination.allow_http requires dev.relaxed = true".to_string(),
            ));
        }
        if self.allow_private_networks && !relaxed {
            return Err(ConfigError::Invalid(
                "destination.allow_private_networks requires dev.relaxed = true".to_string(),
            ));
        }
        if let Some(allowed) = &self.allowed_hosts {
            validate_host_patterns("destination.allowed_hosts", allowed)?;
        }
        validate_host_patterns("destination.denied_hosts", &self.denied_hosts)?;
        Ok(())
    }
}

/// Development-mode overrides.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DevConfig {
    /// Enable the relaxed development mode.
    #[serde(default)]
    pub relaxed: bool,
}

/// Outbound transport configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// User agent string for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Connect only to the addresses approved by destination validation.
    #[serde(default)]
    pub pin_dns: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            pin_dns: false,
        }
    }
}

impl TransportConfig {
    /// Validates transport settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let agent = self.user_agent.trim();
        if agent.is_empty() {
            return Err(ConfigError::Invalid("transport.user_agent must be non-empty".to_string()));
        }
        if agent.len() > MAX_USER_AGENT_LENGTH {
            return Err(ConfigError::Invalid("transport.user_agent exceeds max length".to_string()));
        }
        if agent.chars().any(char::is_control) {
            return Err(ConfigError::Invalid(
                "transport.user_agent must not contain control characters".to_string(),
            ));
        }
        Ok(())
    }
}

/// Egress log sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSinkKind {
    /// JSON lines to stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard events.
    None,
}

/// Egress logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: LogSinkKind,
    /// Log file path (required for the file sink).
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl LoggingConfig {
    /// Validates sink settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (LogSinkKind::File, None) => Err(ConfigError::Invalid(
                "logging.path is required when logging.sink = \"file\"".to_string(),
            )),
            (LogSinkKind::File, Some(path)) => validate_path(path),
            (LogSinkKind::Stderr | LogSinkKind::None, Some(_)) => Err(ConfigError::Invalid(
                "logging.path is only valid when logging.sink = \"file\"".to_string(),
            )),
            (LogSinkKind::Stderr | LogSinkKind::None, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default request quota.
const fn default_max_requests() -> u32 {
    DEFAULT_MAX_REQUESTS
}

/// Default timeout in milliseconds.
const fn default_timeout_ms() -> u64 {
    5_000
}

/// Default timeout ceiling in milliseconds.
const fn default_max_timeout_ms() -> u64 {
    30_000
}

/// Default response ceiling.
const fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

/// Default request ceiling.
const fn default_max_request_bytes() -> usize {
    DEFAULT_MAX_REQUEST_BYTES
}

/// Default attempts per logical request.
const fn default_max_attempts() -> u32 {
    3
}

/// Default base backoff wait.
const fn default_base_wait_ms() -> u64 {
    1_000
}

/// Default maximum backoff wait.
const fn default_max_wait_ms() -> u64 {
    10_000
}

/// Default jitter ceiling.
const fn default_max_jitter_ms() -> u64 {
    1_000
}

/// Default outbound user agent.
fn default_user_agent() -> String {
    "sandbox-egress/0.1".to_string()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid("path must be non-empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a body size ceiling.
fn validate_byte_ceiling(field: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(format!("{field} must be greater than zero")));
    }
    if value > MAX_BODY_CEILING_BYTES {
        return Err(ConfigError::Invalid(format!(
            "{field} must not exceed {MAX_BODY_CEILING_BYTES}"
        )));
    }
    Ok(())
}

/// Validates host allow/deny patterns.
fn validate_host_patterns(field: &str, patterns: &[String]) -> Result<(), ConfigError> {
    if patterns.len() > MAX_HOST_RULES {
        return Err(ConfigError::Invalid(format!("{field} has too many entries")));
    }
    for pattern in patterns {
        let trimmed = pattern.trim();
        if trimmed.is_empty() || trimmed == "*." {
            return Err(ConfigError::Invalid(format!("{field} entries must be non-empty")));
        }
        if trimmed.len() > MAX_HOST_PATTERN_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} entry exceeds max length")));
        }
        if trimmed.contains(['/', ':', '@', ' ']) && !trimmed.starts_with('[') {
            return Err(ConfigError::Invalid(format!("{field} entries must be bare hosts")));
        }
    }
    Ok(())
}
