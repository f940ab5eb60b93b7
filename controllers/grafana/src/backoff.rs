//! # Exponential Backoff
//!
//! Backoff for health-endpoint probes during an apply. Unlike reconcile
//! requeues (minutes), health probes operate on a seconds scale: the
//! service was just (re)started and usually comes up quickly, so the
//! default policy is 3 attempts at 3s, 6s, 12s.

use std::time::Duration;

/// Retry budget for health probing.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of probe attempts before the apply is declared failed
    pub attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt
    pub initial: Duration,
    /// Cap on any single delay
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial: Duration::from_secs(3),
            max: Duration::from_secs(30),
        }
    }
}

/// Exponential backoff calculator
///
/// Returns the current delay and doubles it, capped at the maximum.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    current: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a backoff following the given policy.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            initial: policy.initial,
            current: policy.initial,
            max: policy.max,
        }
    }

    /// Get the next delay and advance the sequence.
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        self.current = std::cmp::min(self.current.saturating_mul(2), self.max);
        result
    }

    /// Reset to the initial delay.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
