//! Write transaction - one validated insert, retried while the database is busy

use crate::engine::Session;
use crate::{BenchError, Record, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff policy for lock contention
///
/// DELETE mode serializes writers on a single database lock; a writer that
/// loses the race sees `SQLITE_BUSY` once the connection's busy timeout runs
/// out. Those failures are retried with exponential backoff instead of failing
/// the whole run. Every other error is returned immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per record, including the first
    pub max_attempts: u32,
    /// Sleep after the first busy failure; doubles on each further failure
    pub initial_backoff: Duration,
    /// Cap on a single sleep
    pub max_backoff: Duration,
    /// Randomize each sleep within `[0, backoff]`
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::config::RETRY_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(crate::config::RETRY_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(crate::config::RETRY_MAX_BACKOFF_MS),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Fail on the first busy error
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Fixed-delay retries, mostly useful in tests
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff: delay,
            max_backoff: delay,
            jitter: false,
        }
    }

    /// Sleep before attempt `failed + 1`, given `failed` busy failures so far
    pub fn backoff(&self, failed: u32) -> Duration {
        let shift = failed.saturating_sub(1).min(16);
        let backoff = self
            .initial_backoff
            .saturating_mul(1 << shift)
            .min(self.max_backoff);

        if self.jitter && !backoff.is_zero() {
            let nanos = backoff.as_nanos().min(u64::MAX as u128) as u64;
            Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
        } else {
            backoff
        }
    }
}

/// Validate `record` and commit it through `session`
///
/// Returns the number of retries the insert needed. An invalid record is
/// rejected with [`BenchError::BadRecord`] before the session sees anything.
pub fn write_record<S: Session>(
    session: &mut S,
    record: &Record,
    policy: &RetryPolicy,
) -> Result<u32> {
    record.validate()?;

    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match session.insert(record) {
            Ok(()) => return Ok(attempt - 1),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let wait = policy.backoff(attempt);
                debug!(
                    "Insert of key {} busy (attempt {}/{}), retrying in {:?}",
                    record.key, attempt, max_attempts, wait
                );
                thread::sleep(wait);
                attempt += 1;
            }
            Err(e) if e.is_retryable() => {
                warn!("Insert of key {} still busy after {} attempts", record.key, attempt);
                return Err(BenchError::RetriesExhausted {
                    attempts: attempt,
                    last: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
}
