//! Retry decision and backoff computation for failed unit executions.
//!
//! Pure functions over `RetryPolicy`; no state. The configured
//! `retryable_error_codes` allow-list is enforced: an empty list retries
//! any failure, a non-empty list only failures whose machine code matches.

use std::time::Duration;

use skillrun_types::config::RetryPolicy;

/// Delay before retry number `retry_count + 1`.
///
/// `min(backoff_ms * backoff_multiplier^retry_count, max_backoff_ms)` --
/// monotonically non-decreasing in `retry_count` and capped.
pub fn backoff_delay(retry_count: u32, policy: &RetryPolicy) -> Duration {
    let factor = policy.backoff_multiplier.powi(retry_count as i32);
    let raw = policy.backoff_ms as f64 * factor;
    let capped = raw.min(policy.max_backoff_ms as f64).max(0.0);
    Duration::from_millis(capped.round() as u64)
}

/// Whether a failure with this machine code is eligible for retry.
pub fn is_retryable(code: &str, policy: &RetryPolicy) -> bool {
    policy.retryable_error_codes.is_empty()
        || policy.retryable_error_codes.iter().any(|c| c == code)
}

/// Full retry decision: attempts left and the error code is retryable.
pub fn should_retry(retry_count: u32, code: &str, policy: &RetryPolicy) -> bool {
    retry_count < policy.max_retries && is_retryable(code, policy)
}
