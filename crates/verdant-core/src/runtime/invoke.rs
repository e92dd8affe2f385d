//! Timeout and retry wrapper around activity calls.

use std::time::Duration;

use crate::activities::{ActivityError, ActivityResult};
use crate::metrics::METRICS;
use crate::obs;
use crate::runtime::policy::ActivityOptions;

/// Run `call` under the given options: each attempt is bounded by the
/// timeout, failures are retried per the policy with multiplicative
/// backoff.
///
/// When the whole budget is spent, a multi-attempt policy yields
/// [`ActivityError::Exhausted`] wrapping the last attempt's error; a
/// single-attempt policy yields the attempt's error unwrapped.
pub async fn invoke<T, F, Fut>(
    activity: &str,
    opts: &ActivityOptions,
    mut call: F,
) -> ActivityResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ActivityResult<T>>,
{
    let max_attempts = opts.retry.max_attempts.max(1);
    let mut backoff = opts.retry.initial_backoff;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        METRICS.inc_activities_invoked();

        let err = match tokio::time::timeout(opts.timeout, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(_) => ActivityError::Timeout {
                activity: activity.to_string(),
                timeout_ms: opts.timeout.as_millis() as u64,
            },
        };

        if attempt >= max_attempts {
            if max_attempts > 1 {
                return Err(ActivityError::Exhausted {
                    activity: activity.to_string(),
                    attempts: attempt,
                    source: Box::new(err),
                });
            }
            return Err(err);
        }

        obs::emit_activity_retry(activity, attempt, max_attempts, &err.to_string());
        if backoff > Duration::ZERO {
            tokio::time::sleep(backoff).await;
            backoff = backoff.mul_f64(opts.retry.backoff_multiplier);
        }
    }
}
