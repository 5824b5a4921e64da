use std::time::Duration;

use rand::RngExt;

use crate::core::config::RetrySettings;

/// One reusable backoff policy shared by navigation and capture.
///
/// The budget is a fixed attempt count; delays follow an exponential curve
/// capped at `max_delay`, with uniform jitter added on top so repeated
/// failures against the same endpoint don't synchronize.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn from_settings(s: &RetrySettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            base_delay: Duration::from_millis(s.base_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
            jitter: Duration::from_millis(s.jitter_ms),
        }
    }

    /// Deterministic part of the curve: base * 2^(attempt-1), capped.
    /// `attempt` is 1-based (the delay taken *after* that attempt failed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let scaled = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exp));
        scaled.min(self.max_delay)
    }

    /// Curve delay plus a uniform random jitter in [0, jitter].
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.delay_for(attempt) + Duration::from_millis(extra)
    }
}
