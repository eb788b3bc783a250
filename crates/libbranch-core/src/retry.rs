//! Bounded exponential backoff for transient source failures

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::BranchError;

/// Retry behavior for calls into a revision source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first call
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Add up to 25% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Retries without sleeping; used by tests and offline imports
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Delay before the given attempt (0-indexed; the first attempt never waits)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.max_delay_ms as f64).max(0.0);

        let delay_ms = if self.jitter && capped_ms > 0.0 {
            capped_ms + capped_ms * 0.25 * rand::thread_rng().gen::<f64>()
        } else {
            capped_ms
        };
        Duration::from_millis(delay_ms as u64)
    }

    /// Run `op`, retrying transient failures.
    ///
    /// Non-retryable errors are returned immediately. When every attempt
    /// fails transiently the last error becomes `RetriesExhausted`.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T, BranchError>
    where
        F: FnMut() -> Result<T, BranchError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let delay = self.delay_for_attempt(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(BranchError::RetriesExhausted {
                            attempts,
                            last: e.to_string(),
                        });
                    }
                    warn!(attempt, max_attempts = attempts, error = %e, "{} failed, retrying", what);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
