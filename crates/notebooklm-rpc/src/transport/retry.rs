//! Retry policy with exponential backoff.
//!
//! Retry decisions are data-driven: the policy inspects the error variant
//! and the per-class attempt count, never exception classes or message
//! strings. Only throttling is retried on a schedule; an expired token is
//! retried exactly once, immediately after a successful refresh.

use crate::RpcError;
use rand::Rng;
use std::time::Duration;

/// Configuration for retry behavior on one logical call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries permitted after rate-limit responses. Zero by default: a
    /// throttled call is not retried unless the caller asks for it.
    pub max_rate_limit_retries: u32,
    /// Initial backoff delay.
    pub base_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
    /// Whether to add random jitter (0.5x–1.5x) to delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 0,
            base_delay: crate::config::NetworkConfig::RETRY_BASE_DELAY,
            max_delay: crate::config::NetworkConfig::RETRY_MAX_DELAY,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of rate-limit retries.
    pub fn with_max_rate_limit_retries(mut self, retries: u32) -> Self {
        self.max_rate_limit_retries = retries;
        self
    }

    /// Set the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Decide whether to retry after `error`, given how many retries of
    /// that error's class this call has already performed.
    ///
    /// Returns the delay to sleep before the retry, or `None` when the
    /// error is terminal for this call.
    pub fn should_retry(&self, attempt: u32, error: &RpcError) -> Option<Duration> {
        match error {
            RpcError::RateLimited { retry_after_secs } => {
                if attempt >= self.max_rate_limit_retries {
                    return None;
                }
                let mut delay = self.backoff_delay(attempt);
                // A server-provided Retry-After lower-bounds the backoff.
                if let Some(secs) = retry_after_secs {
                    delay = delay.max(Duration::from_secs(*secs));
                }
                Some(delay)
            }
            // One immediate retry with fresh credentials, never chained.
            RpcError::AuthExpired { .. } if attempt == 0 => Some(Duration::ZERO),
            _ => None,
        }
    }

    /// Backoff for a given attempt (0-indexed): `base * 2^attempt`,
    /// capped at `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let multiplier = 2f64.powi(attempt.min(32) as i32);
        let delay_secs = self.base_delay.as_secs_f64() * multiplier;
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64());

        let final_secs = if self.jitter {
            let jitter_factor = rand::rng().random_range(0.5..1.5);
            (capped_secs * jitter_factor).min(self.max_delay.as_secs_f64())
        } else {
            capped_secs
        };

        Duration::from_secs_f64(final_secs)
    }
}
