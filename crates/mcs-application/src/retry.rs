//! Retry with exponential backoff
//!
//! Shared policy for transient upstream failures: exponential delay from a
//! 250 ms base, capped at 4 s, at most 5 attempts, with ±20% jitter so
//! synchronized clients do not stampede a recovering dependency.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use mcs_domain::constants::{
    RETRY_BASE_DELAY_MS, RETRY_JITTER_FRACTION, RETRY_MAX_ATTEMPTS, RETRY_MAX_DELAY_MS,
};
use mcs_domain::error::Result;

/// Backoff policy parameters
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Base delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Jitter fraction applied to each delay
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(RETRY_MAX_DELAY_MS),
            max_attempts: RETRY_MAX_ATTEMPTS,
            jitter: RETRY_JITTER_FRACTION,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (1-based), with jitter applied
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exponential.min(self.max_delay);

        let jitter_factor = {
            let mut rng = rand::rng();
            1.0 + rng.random_range(-self.jitter..=self.jitter)
        };
        capped.mul_f64(jitter_factor.max(0.0))
    }
}

/// Run an operation, retrying transient failures per the policy
///
/// Permanent errors (invalid argument, denied, budget exhausted, ...) are
/// returned immediately; only transient kinds consume attempts.
pub async fn with_backoff<T, F, Fut>(label: &str, policy: BackoffPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.kind().is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                debug!(
                    operation = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure; backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Convenience wrapper using the default policy
pub async fn with_default_backoff<T, F, Fut>(label: &str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_backoff(label, BackoffPolicy::default(), op).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_domain::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delays_grow_and_cap() {
        let policy = BackoffPolicy {
            jitter: 0.0,
            ..BackoffPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(1000));
        // Attempt 6 would be 8s uncapped
        assert_eq!(policy.delay_for_attempt(6), Duration::from_millis(4000));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = BackoffPolicy::default();
        for attempt in 1..=5 {
            let base = BackoffPolicy {
                jitter: 0.0,
                ..policy
            }
            .delay_for_attempt(attempt);
            let jittered = policy.delay_for_attempt(attempt);
            let lo = base.mul_f64(1.0 - RETRY_JITTER_FRACTION);
            let hi = base.mul_f64(1.0 + RETRY_JITTER_FRACTION);
            assert!(jittered >= lo && jittered <= hi, "attempt {attempt}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_default_backoff("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::upstream("flaky"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_fail_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_default_backoff("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::invalid_argument("bad input")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
