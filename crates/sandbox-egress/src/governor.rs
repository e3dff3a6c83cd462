// crates/sandbox-egress/src/governor.rs
// ============================================================================
// Module: Request Governor
// Description: Per-execution quota, body size, and timeout enforcement.
// Purpose: Bound the network work one script execution can cause.
// Dependencies: sandbox-egress-core
// ============================================================================

//! ## Overview
//! The governor is a set of free functions over [`ExecutionContext`]. Quota is
//! reserved per attempt, so retries spend the same budget as fresh calls.
//! Response bodies are read incrementally and abandoned as soon as the running
//! total passes the ceiling, whatever `Content-Length` claims.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::Read;
use std::time::Duration;

use sandbox_egress_core::EgressError;
use sandbox_egress_core::ExecutionContext;
use sandbox_egress_core::ExecutionLimits;
use sandbox_egress_core::MIN_TIMEOUT;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Chunk size for incremental body reads.
const READ_CHUNK_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Quota
// ============================================================================

/// Reserves one attempt from the execution quota.
///
/// Returns the 1-based sequence number of the reserved attempt.
///
/// # Errors
///
/// Returns [`EgressError::RequestLimitExceeded`] when the quota is spent. The
/// counter is left unchanged in that case.
pub fn reserve(ctx: &mut ExecutionContext) -> Result<u32, EgressError> {
    ctx.try_consume_request().ok_or(EgressError::RequestLimitExceeded {
        max_requests: ctx.limits().max_requests,
    })
}

/// Rejects request bodies over the configured ceiling.
///
/// # Errors
///
/// Returns [`EgressError::RequestTooLarge`] when `size` exceeds the limit.
pub const fn check_request_body(ctx: &ExecutionContext, size: usize) -> Result<(), EgressError> {
    let max_bytes = ctx.limits().max_request_bytes;
    if size > max_bytes {
        return Err(EgressError::RequestTooLarge {
            max_bytes,
            actual_bytes: size,
        });
    }
    Ok(())
}

/// Computes the timeout for one attempt.
///
/// Falls back to the default when none is requested and clamps the result to
/// `[MIN_TIMEOUT, max_timeout]`.
#[must_use]
pub fn effective_timeout(limits: &ExecutionLimits, requested: Option<Duration>) -> Duration {
    let ceiling = limits.max_timeout.max(MIN_TIMEOUT);
    requested.unwrap_or(limits.default_timeout).clamp(MIN_TIMEOUT, ceiling)
}

// ============================================================================
// SECTION: Response Streaming
// ============================================================================

/// Reads a response body while enforcing the byte ceiling.
///
/// A declared `content_length` over the limit fails before any byte is read.
/// Otherwise the stream is consumed in chunks and abandoned once the running
/// total exceeds `max_bytes`.
///
/// # Errors
///
/// Returns [`EgressError::ResponseTooLarge`] when the body exceeds the limit,
/// [`EgressError::Timeout`] when the read times out, and
/// [`EgressError::Connection`] for other read failures.
pub fn cap_streaming_read<R>(
    reader: &mut R,
    content_length: Option<u64>,
    max_bytes: usize,
) -> Result<Vec<u8>, EgressError>
where
    R: Read + ?Sized,
{
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if content_length.is_some_and(|declared| declared > limit) {
        return Err(EgressError::ResponseTooLarge {
            max_bytes,
        });
    }
    let mut body = Vec::new();
    let mut chunk = vec![0_u8; READ_CHUNK_BYTES];
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(map_read_error(&err)),
        };
        let bytes = chunk.get(..read).ok_or_else(|| {
            EgressError::Connection("response body reader returned an invalid length".to_string())
        })?;
        if body.len().saturating_add(bytes.len()) > max_bytes {
            return Err(EgressError::ResponseTooLarge {
                max_bytes,
            });
        }
        body.extend_from_slice(bytes);
    }
    Ok(body)
}

/// Maps body read failures onto egress errors.
fn map_read_error(err: &io::Error) -> EgressError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            EgressError::Timeout("response body read timed out".to_string())
        }
        _ => EgressError::Connection("response body read failed".to_string()),
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
        reason = "Test-only assertions are permitted."
    )]

    use std::io::Cursor;

    use sandbox_egress_core::TenantId;

    use super::*;

    /// Reader that yields one byte at a time and counts reads.
    struct TrickleReader {
        remaining: usize,
        reads: usize,
    }

    impl Read for TrickleReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            if self.remaining == 0 || buf.is_empty() {
                return Ok(0);
            }
            self.remaining -= 1;
            buf[0] = b'x';
            Ok(1)
        }
    }

    fn limits(max_requests: u32) -> ExecutionLimits {
        ExecutionLimits {
            max_requests,
            ..ExecutionLimits::default()
        }
    }

    #[test]
    fn reserve_fails_after_quota() {
        let mut ctx = ExecutionContext::new(Some(TenantId::new("t")), limits(2));
        assert_eq!(reserve(&mut ctx).unwrap(), 1);
        assert_eq!(reserve(&mut ctx).unwrap(), 2);
        assert_eq!(
            reserve(&mut ctx),
            Err(EgressError::RequestLimitExceeded {
                max_requests: 2
            })
        );
        assert_eq!(ctx.requests_issued(), 2);
    }

    #[test]
    fn request_body_limit_is_inclusive() {
        let ctx = ExecutionContext::new(None, ExecutionLimits {
            max_request_bytes: 4,
            ..ExecutionLimits::default()
        });
        assert!(check_request_body(&ctx, 4).is_ok());
        assert!(matches!(
            check_request_body(&ctx, 5),
            Err(EgressError::RequestTooLarge {
                max_bytes: 4,
                actual_bytes: 5
            })
        ));
    }

    #[test]
    fn timeout_is_clamped() {
        let limits = ExecutionLimits::default();
        assert_eq!(effective_timeout(&limits, None), limits.default_timeout);
        assert_eq!(effective_timeout(&limits, Some(Duration::from_millis(10))), MIN_TIMEOUT);
        assert_eq!(effective_timeout(&limits, Some(Duration::from_secs(600))), limits.max_timeout);
    }

    #[test]
    fn declared_length_rejects_without_reading() {
        let mut reader = TrickleReader {
            remaining: 10,
            reads: 0,
        };
        let result = cap_streaming_read(&mut reader, Some(11), 10);
        assert!(matches!(result, Err(EgressError::ResponseTooLarge { max_bytes: 10 })));
        assert_eq!(reader.reads, 0);
    }

    #[test]
    fn undeclared_stream_aborts_past_limit() {
        let mut reader = TrickleReader {
            remaining: 1_000,
            reads: 0,
        };
        let result = cap_streaming_read(&mut reader, None, 16);
        assert!(matches!(result, Err(EgressError::ResponseTooLarge { max_bytes: 16 })));
        assert_eq!(reader.reads, 17);
    }

    #[test]
    fn body_at_limit_is_returned() {
        let mut reader = Cursor::new(vec![7_u8; 16]);
        assert_eq!(cap_streaming_read(&mut reader, None, 16).unwrap(), vec![7_u8; 16]);
    }
}
