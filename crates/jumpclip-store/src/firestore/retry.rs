//! Exponential backoff with jitter for transient Firestore failures.

use std::time::Duration;

use tracing::{info_span, warn, Instrument};

use super::error::{FirestoreError, FirestoreResult};
use super::metrics::record_retry;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub base_delay_ms: u64,
    /// Upper bound on a computed delay, before jitter.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Reads `FIRESTORE_RETRY_BASE_MS` and `FIRESTORE_RETRY_MAX_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: defaults.max_retries,
            base_delay_ms: env_u64("FIRESTORE_RETRY_BASE_MS").unwrap_or(defaults.base_delay_ms),
            max_delay_ms: env_u64("FIRESTORE_RETRY_MAX_MS").unwrap_or(defaults.max_delay_ms),
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

// ============================================================================
// Retry loop
// ============================================================================

/// Run `op`, retrying network errors, 429 and 5xx.
///
/// Other failures (including precondition failures) are returned immediately.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    op: F,
) -> FirestoreResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = FirestoreResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        let span = info_span!("firestore_retry", operation = %operation, attempt = attempt + 1);

        match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = calculate_delay(config, attempt, e.retry_after_ms());
                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Firestore operation failed, retrying: {}",
                    e
                );
                record_retry(operation);
                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| FirestoreError::request_failed("retries exhausted")))
}

fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
    if let Some(after) = retry_after_ms {
        return Duration::from_millis(after);
    }

    let capped = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_delay_ms);

    // Full jitter from the clock's sub-second nanos; no rand dependency.
    let jittered = if capped > 0 {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        ((capped as f64) * ((nanos % 1000) as f64 / 1000.0)) as u64
    } else {
        0
    };

    Duration::from_millis(jittered.max(config.base_delay_ms))
}
