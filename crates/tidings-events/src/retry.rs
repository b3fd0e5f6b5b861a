//! Retry policy for webhook deliveries
//!
//! Exponential backoff: the delay after attempt `n` is `base * 2^(n-1)`,
//! capped at `max_delay`, then randomized by `±jitter_factor`. A 429 response
//! carrying `Retry-After` replaces the computed delay (still capped).

use rand::Rng;
use std::time::Duration;
use tidings_core::config::RetryConfig;

use crate::error::DeliveryError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_factor: config.jitter_factor.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp { reason: String },
}

impl RetryPolicy {
    /// Decide what to do after `attempt` (1-based) failed with `error`.
    pub fn decide(&self, attempt: u32, error: &DeliveryError) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::GiveUp {
                reason: format!("non-retryable error: {}", error),
            };
        }

        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp {
                reason: format!("maximum attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = match error.retry_after() {
            Some(requested) => requested.min(self.max_delay),
            None => self.jittered(self.backoff(attempt)),
        };

        RetryDecision::Retry { delay }
    }

    /// Un-jittered delay after `attempt` failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(exponent))
            .min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 || delay.is_zero() {
            return delay;
        }

        let spread = rand::rng().random_range(-self.jitter_factor..=self.jitter_factor);
        delay.mul_f64(1.0 + spread).min(self.max_delay)
    }
}
