//! Per-call-site timeout and retry configuration.

use std::time::Duration;

/// Retry schedule for one activity call site.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts allowed, the first call included. `1` means no retry.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_backoff: Duration,

    /// Factor applied to the backoff after each retry.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Up to `max_attempts` total attempts with doubling backoff.
    pub fn attempts(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            backoff_multiplier: 2.0,
        }
    }
}

/// Timeout plus retry policy for one activity call site.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    /// Deadline applied to each individual attempt.
    pub timeout: Duration,

    /// Retry schedule across attempts.
    pub retry: RetryPolicy,
}

impl ActivityOptions {
    /// One attempt bounded by `timeout`.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            timeout,
            retry: RetryPolicy::none(),
        }
    }

    /// Up to `max_attempts` attempts, each bounded by `timeout`.
    pub fn retried(timeout: Duration, max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            timeout,
            retry: RetryPolicy::attempts(max_attempts, initial_backoff),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_a_single_attempt() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.initial_backoff, Duration::ZERO);
    }

    #[test]
    fn test_attempts_floor_at_one() {
        assert_eq!(RetryPolicy::attempts(0, Duration::from_secs(1)).max_attempts, 1);
        assert_eq!(RetryPolicy::attempts(3, Duration::from_secs(1)).max_attempts, 3);
    }
}
