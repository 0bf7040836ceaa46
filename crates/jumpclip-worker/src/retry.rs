//! Bounded retries for job writes and log throttling for the receive loop.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

// ============================================================================
// Bounded retry
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Doubles each attempt
    pub base_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Name used in retry log lines
    pub operation_name: &'static str,
}

impl RetryConfig {
    pub fn new(operation_name: &'static str) -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            operation_name,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, `retry_when` rejects the error, or the
/// retries run out. The last error is returned.
pub async fn retry_async<F, Fut, T, E, P>(
    config: &RetryConfig,
    retry_when: P,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.max_retries && retry_when(&e) => {
                attempt += 1;
                let delay = config.delay_for_attempt(attempt);
                debug!(
                    "{} attempt {} failed, retrying in {:?}: {}",
                    config.operation_name, attempt, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if attempt > 0 {
                    warn!(
                        "{} failed after {} attempts: {}",
                        config.operation_name,
                        attempt + 1,
                        e
                    );
                }
                return Err(e);
            }
        }
    }
}

// ============================================================================
// Failure tracking
// ============================================================================

/// Counts consecutive failures of a repeated operation and stops logging
/// after `max_logged_failures` until it recovers.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive_failures: u32,
    max_logged_failures: u32,
}

impl FailureTracker {
    pub fn new(max_logged_failures: u32) -> Self {
        Self {
            consecutive_failures: 0,
            max_logged_failures,
        }
    }

    pub fn record_success(&mut self) {
        if self.consecutive_failures > self.max_logged_failures {
            debug!(
                "Recovered after {} consecutive failures",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
    }

    /// Returns `true` when this failure should be logged.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures == self.max_logged_failures + 1 {
            warn!(
                "Suppressing further failure logs after {} consecutive failures",
                self.max_logged_failures
            );
        }
        self.consecutive_failures <= self.max_logged_failures
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }

    /// Pause before the next attempt: 1s doubling to 30s.
    pub fn backoff(&self) -> Duration {
        let exp = self.consecutive_failures.saturating_sub(1).min(5);
        Duration::from_secs(1u64 << exp).min(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_doubles_and_caps() {
        let config = RetryConfig::new("test").with_base_delay(Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(20), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_eventual_success() {
        let config = RetryConfig::new("test").with_base_delay(Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = retry_async(&config, |_: &&str| true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_predicate_stops_retries() {
        let config = RetryConfig::new("test").with_base_delay(Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: Result<(), &str> = retry_async(&config, |e: &&str| *e != "fatal", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("fatal") }
        })
        .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let config = RetryConfig::new("test")
            .with_base_delay(Duration::from_millis(1))
            .with_max_retries(2);
        let calls = AtomicU32::new(0);

        let result: Result<(), &str> = retry_async(&config, |_: &&str| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("down") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failure_tracker_suppression() {
        let mut tracker = FailureTracker::new(2);
        assert!(tracker.record_failure());
        assert!(tracker.record_failure());
        assert!(!tracker.record_failure());
        assert!(!tracker.record_failure());
        assert_eq!(tracker.backoff(), Duration::from_secs(8));

        tracker.record_success();
        assert_eq!(tracker.failure_count(), 0);
        assert!(tracker.record_failure());
        assert_eq!(tracker.backoff(), Duration::from_secs(1));
    }
}
