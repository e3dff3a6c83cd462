// crates/sandbox-egress/src/retry.rs
// ============================================================================
// Module: Retry Controller
// Description: Bounded retries with exponential backoff and Retry-After.
// Purpose: Absorb transient upstream failures without exceeding quota.
// Dependencies: sandbox-egress-config, sandbox-egress-core, rand, time
// ============================================================================

//! ## Overview
//! [`RetryController`] drives one logical request through at most
//! `max_attempts` attempts. Connection failures and retryable statuses
//! (429, 502, 503, 504) wait and retry; everything else returns at once. Waits
//! honor `Retry-After` when present and never exceed `max_wait`. The quota is
//! checked before every wait, so an exhausted budget stops the loop without
//! sleeping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use sandbox_egress_config::RetryConfig;
use sandbox_egress_core::EgressError;
use sandbox_egress_core::ExecutionContext;
use sandbox_egress_core::Sleeper;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default attempt ceiling.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base backoff.
pub const DEFAULT_BASE_WAIT: Duration = Duration::from_secs(1);
/// Default wait ceiling.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);
/// Default jitter ceiling.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_secs(1);
/// Lower bound applied to `Retry-After` waits.
const MIN_RETRY_AFTER: Duration = Duration::from_secs(1);
/// IMF-fixdate layout used by `Retry-After` dates.
const HTTP_DATE_FORMAT: &str =
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT";

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Attempt and wait bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Base backoff doubled per retry.
    pub base_wait: Duration,
    /// Ceiling for any single wait.
    pub max_wait: Duration,
    /// Upper bound for random jitter.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_wait: DEFAULT_BASE_WAIT,
            max_wait: DEFAULT_MAX_WAIT,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Builds a policy from configuration.
    #[must_use]
    pub const fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_wait: Duration::from_millis(config.base_wait_ms),
            max_wait: Duration::from_millis(config.max_wait_ms),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
        }
    }

    /// Computes the backoff before retry `attempt_index` (0-based).
    ///
    /// The wait is `base_wait * 2^attempt_index + jitter`, capped at
    /// `max_wait`.
    #[must_use]
    pub fn backoff(&self, attempt_index: u32, jitter: Duration) -> Duration {
        let factor = 2_u32.saturating_pow(attempt_index);
        self.base_wait.saturating_mul(factor).saturating_add(jitter).min(self.max_wait)
    }

    /// Clamps a server-provided `Retry-After` hint.
    #[must_use]
    pub fn retry_after_wait(&self, hint: Duration) -> Duration {
        hint.clamp(MIN_RETRY_AFTER, self.max_wait.max(MIN_RETRY_AFTER))
    }

    /// Draws a random jitter in `[0, max_jitter]`.
    fn jitter(&self) -> Duration {
        let ceiling = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }
}

/// Returns true for statuses that warrant a retry.
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

/// Parses a `Retry-After` value as delta-seconds or an HTTP date.
///
/// Dates in the past yield a zero wait. Unparseable values yield `None`.
#[must_use]
pub fn parse_retry_after(value: &str, now: OffsetDateTime) -> Option<Duration> {
    let trimmed = value.trim();
    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let target = parse_http_date(trimmed)?;
    Some(Duration::try_from(target - now).unwrap_or(Duration::ZERO))
}

/// Parses an IMF-fixdate timestamp.
fn parse_http_date(value: &str) -> Option<OffsetDateTime> {
    let items = format_description::parse_borrowed::<2>(HTTP_DATE_FORMAT).ok()?;
    PrimitiveDateTime::parse(value, items.as_slice()).ok().map(PrimitiveDateTime::assume_utc)
}

// ============================================================================
// SECTION: Sleepers
// ============================================================================

/// Sleeper that blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

// ============================================================================
// SECTION: Attempt Outcomes
// ============================================================================

/// Successful result of one attempt.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    /// Final value; no retry.
    Complete(T),
    /// Retryable status; returned as-is once attempts run out.
    RetryableStatus {
        /// Value produced by the attempt.
        value: T,
        /// Server-provided wait hint.
        retry_after: Option<Duration>,
    },
}

/// Failed attempt.
#[derive(Debug)]
pub enum AttemptFailure {
    /// Failure that may be retried.
    Retryable(EgressError),
    /// Failure that ends the loop.
    Fatal(EgressError),
}

/// Final value with the number of attempts made.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Value from the last attempt.
    pub value: T,
    /// Attempts made.
    pub attempts: u32,
}

/// Terminal error with the number of attempts made.
#[derive(Debug)]
pub struct RetryFailure {
    /// Error returned to the caller.
    pub error: EgressError,
    /// Attempts made.
    pub attempts: u32,
}

// ============================================================================
// SECTION: Controller
// ============================================================================

/// Retry loop over an attempt closure.
#[derive(Clone)]
pub struct RetryController {
    /// Attempt and wait bounds.
    policy: RetryPolicy,
    /// Wait implementation.
    sleeper: Arc<dyn Sleeper>,
}

impl RetryController {
    /// Creates a controller.
    #[must_use]
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            policy,
            sleeper,
        }
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `attempt` until it completes, fails fatally, or attempts run out.
    ///
    /// `attempt` receives the context and the 1-based attempt number. It is
    /// expected to reserve quota itself.
    ///
    /// # Errors
    ///
    /// Returns [`RetryFailure`] for fatal failures, for retryable failures on
    /// the last attempt, and with [`EgressError::RequestLimitExceeded`] when
    /// the quota is spent before a retry.
    pub fn execute<T, F>(
        &self,
        ctx: &mut ExecutionContext,
        mut attempt: F,
    ) -> Result<RetryOutcome<T>, RetryFailure>
    where
        F: FnMut(&mut ExecutionContext, u32) -> Result<AttemptOutcome<T>, AttemptFailure>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = 0_u32;
        loop {
            attempts += 1;
            let exhausted = attempts >= max_attempts;
            let retry_after = match attempt(ctx, attempts) {
                Ok(AttemptOutcome::Complete(value)) => {
                    return Ok(RetryOutcome {
                        value,
                        attempts,
                    });
                }
                Ok(AttemptOutcome::RetryableStatus {
                    value,
                    retry_after,
                }) => {
                    if exhausted {
                        return Ok(RetryOutcome {
                            value,
                            attempts,
                        });
                    }
                    retry_after
                }
                Err(AttemptFailure::Fatal(error)) => {
                    return Err(RetryFailure {
                        error,
                        attempts,
                    });
                }
                Err(AttemptFailure::Retryable(error)) => {
                    if exhausted {
                        return Err(RetryFailure {
                            error,
                            attempts,
                        });
                    }
                    None
                }
            };
            if ctx.requests_remaining() == 0 {
                return Err(RetryFailure {
                    error: EgressError::RequestLimitExceeded {
                        max_requests: ctx.limits().max_requests,
                    },
                    attempts,
                });
            }
            let wait = retry_after.map_or_else(
                || self.policy.backoff(attempts - 1, self.policy.jitter()),
                |hint| self.policy.retry_after_wait(hint),
            );
            self.sleeper.sleep(wait);
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
