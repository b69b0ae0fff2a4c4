//! Retry of transient checkpoint-table failures.
//!
//! Lock contention and serialization failures are retried with capped
//! exponential backoff. A fenced commit is never retried: the writer has
//! been superseded and must stop.

use std::time::Duration;

use crate::error::Result;

const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_BASE_MS: u64 = 100;
const DEFAULT_MAX_MS: u64 = 60_000;

/// Backoff parameters for [`with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base: Duration::from_millis(DEFAULT_BASE_MS),
            max: Duration::from_millis(DEFAULT_MAX_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
    /// capped at `max`.
    #[must_use]
    pub fn compute_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Run `op`, retrying while it fails with a transient error.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-transient error immediately.
pub fn with_retry<T>(policy: &RetryPolicy, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.compute_backoff(attempt);
                #[allow(clippy::cast_possible_truncation)]
                // Safety: delay is capped by policy.max, far below u64::MAX ms
                let delay_ms = delay.as_millis() as u64;
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms,
                    error = %err,
                    "Transient checkpoint table error, will retry"
                );
                std::thread::sleep(delay);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FenceError;
    use matsql_types::MaterializationName;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base: Duration::from_millis(1),
            max: Duration::from_millis(4),
        }
    }

    fn busy() -> FenceError {
        FenceError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ))
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.compute_backoff(1), Duration::from_millis(100));
        assert_eq!(policy.compute_backoff(2), Duration::from_millis(200));
        assert_eq!(policy.compute_backoff(4), Duration::from_millis(800));
        assert_eq!(policy.compute_backoff(20), Duration::from_secs(60));
        assert_eq!(policy.compute_backoff(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn retries_transient_until_success() {
        let mut calls = 0;
        let value = with_retry(&fast(), || {
            calls += 1;
            if calls < 3 {
                Err(busy())
            } else {
                Ok(calls)
            }
        })
        .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let mut calls = 0;
        let err = with_retry(&fast(), || -> Result<()> {
            calls += 1;
            Err(busy())
        })
        .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls, 4);
    }

    #[test]
    fn fenced_is_not_retried() {
        let mut calls = 0;
        let err = with_retry(&fast(), || -> Result<()> {
            calls += 1;
            Err(FenceError::Fenced {
                materialization: MaterializationName::new("m"),
                key_begin: 0,
                key_end: u32::MAX,
                fence: 1,
            })
        })
        .unwrap_err();
        assert!(err.is_fenced());
        assert_eq!(calls, 1);
    }
}
