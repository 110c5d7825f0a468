//! Retry logic with exponential backoff.
//!
//! Applies a model- or call-level [`RetryPolicy`]: bounded attempts,
//! exponential backoff with jitter, and early abort when the cancellation
//! token fires or the error is not retryable.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use flow_core::RetryPolicy;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for llm::LlmError {
    fn is_retryable(&self) -> bool {
        llm::LlmError::is_retryable(self)
    }
}

/// Execute `operation` under `policy`, returning the final result and the
/// number of attempts consumed.
///
/// Non-retryable errors and cancellation stop the loop immediately; the
/// in-flight attempt is always allowed to finish (cancellation is only
/// checked between attempts).
pub async fn with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    label: &str,
    cancel: &CancellationToken,
    mut operation: F,
) -> (std::result::Result<T, E>, u32)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0u32;
    let mut last_error: Option<E> = None;

    while attempts < max_attempts {
        if attempts > 0 {
            let delay = jittered(policy.backoff_for(attempts - 1));
            debug!(
                label = %label,
                attempt = attempts + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying after backoff"
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(label = %label, "retries aborted by cancellation");
                    return (Err(last_error.expect("cancelled before first attempt")), attempts);
                }
                _ = sleep(delay) => {}
            }
        }

        attempts += 1;
        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!(label = %label, attempt = attempts, "retry succeeded");
                }
                return (Ok(result), attempts);
            }
            Err(e) => {
                if !e.is_retryable() {
                    warn!(label = %label, attempt = attempts, error = %e, "non-retryable failure");
                    return (Err(e), attempts);
                }
                if attempts < max_attempts {
                    warn!(
                        label = %label,
                        attempt = attempts,
                        max_attempts = max_attempts,
                        error = %e,
                        "attempt failed, will retry"
                    );
                } else {
                    warn!(label = %label, attempt = attempts, error = %e, "retries exhausted");
                }
                last_error = Some(e);
            }
        }
    }

    (Err(last_error.expect("at least one attempt ran")), attempts)
}

/// Add up to 10% random jitter so concurrent retries don't synchronize.
fn jittered(base: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    if base_ms == 0 {
        return base;
    }
    let jitter = rand::thread_rng().gen_range(0..=base_ms / 10);
    Duration::from_millis(base_ms + jitter)
}
