//! Retry-with-backoff for optimistic-concurrency conflicts.
//!
//! This is the only place retry policy lives; domain operations never
//! re-implement backoff.

use crate::error::Result;
use std::time::Duration;

/// Backoff policy for conflicted writes.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,

    /// Delay before the first retry; doubles each attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-based): `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.min(16))
    }
}

/// Run `op`, retrying on `Conflict` with exponential backoff.
///
/// The closure is re-invoked from scratch each attempt, so read-modify-write
/// callers observe the latest revision on every retry. Any non-conflict
/// failure propagates immediately; a conflict on the final attempt is
/// surfaced to the caller. The backoff sleep is not cancellable.
pub fn with_conflict_retry<T, F>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0u32;
    loop {
        match op() {
            Err(e) if e.is_conflict() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(attempt, ?delay, "write conflicted, backing off");
                std::thread::sleep(delay);
                attempt += 1;
            }
            other => return other,
        }
    }
}
