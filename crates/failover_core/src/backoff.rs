//! Exponential backoff retry-delay computation
//!
//! The engine only computes the delay; the caller owns the actual wait.
//! Jitter is multiplicative and always positive, so the expected delay is
//! non-decreasing in the retry count while synchronized retry storms across
//! callers are broken up.

use std::time::Duration;

/// Default first-retry delay
pub const RETRY_DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default growth factor per retry
pub const RETRY_DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default hard cap on the computed delay
pub const RETRY_DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Jitter fraction lower bound
pub const RETRY_JITTER_MIN: f64 = 0.1;

/// Jitter fraction upper bound
pub const RETRY_JITTER_MAX: f64 = 0.3;

/// Exponent cap; beyond this the raw delay is far past any sane max_delay
const RETRY_MAX_EXPONENT: u32 = 63;

/// Retry pacing configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry
    pub base_delay: Duration,

    /// Multiplier applied per retry
    pub backoff_multiplier: f64,

    /// Hard cap on the computed delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: RETRY_DEFAULT_BASE_DELAY,
            backoff_multiplier: RETRY_DEFAULT_BACKOFF_MULTIPLIER,
            max_delay: RETRY_DEFAULT_MAX_DELAY,
        }
    }
}

/// Compute the delay before retry number `retry_count`
///
/// `min(max_delay, base * multiplier^n + jitter)` with
/// `jitter = U(0.1, 0.3) * base * multiplier^n`.
#[must_use]
pub fn retry_delay(config: &RetryConfig, retry_count: u32) -> Duration {
    let exponent = i32::try_from(retry_count.min(RETRY_MAX_EXPONENT)).unwrap_or(i32::MAX);
    let raw = config.base_delay.as_secs_f64() * config.backoff_multiplier.powi(exponent);

    let jitter_fraction = RETRY_JITTER_MIN + (RETRY_JITTER_MAX - RETRY_JITTER_MIN) * fastrand::f64();
    let jittered = raw + raw * jitter_fraction;

    Duration::from_secs_f64(jittered.min(config.max_delay.as_secs_f64()).max(0.0))
}
