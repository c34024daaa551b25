//! Retry policy for idempotent calls.

use std::thread;
use std::time::Duration;

use tracing::warn;

use super::error::ClientResult;

/// Exponential backoff settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: u32,
    /// Initial retry delay in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum retry delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 8000,
        }
    }
}

impl RetryPolicy {
    /// No retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = self.initial_delay_ms.saturating_mul(2u64.pow(exponent));
        delay.min(self.max_delay_ms)
    }

    /// Run `op`, retrying transient failures.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> ClientResult<T>
    where
        F: FnMut() -> ClientResult<T>,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Err(err) if attempt < self.max_retries && err.is_retryable() => {
                    attempt += 1;
                    let delay = self.backoff_ms(attempt);
                    warn!(call = what, attempt, delay_ms = delay, error = %err, "retrying");
                    thread::sleep(Duration::from_millis(delay));
                }
                other => return other,
            }
        }
    }
}
