// ── Reconnect retry policy ──
//
// Consecutive-failure accounting and exponential backoff with jitter.
// Owned by the streaming session task; nothing else reads or writes it.

use std::time::Duration;

use rand::Rng;

use crate::config::BackoffConfig;

/// What to do after a failed connection attempt or an unexpected close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
    /// Reconnect after `delay` (`base` plus jitter).
    Retry {
        attempt: u32,
        base: Duration,
        delay: Duration,
    },
    /// The failure ceiling was reached; stop reconnecting.
    GiveUp { failures: u32 },
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: BackoffConfig,
    consecutive_failures: u32,
    rate_limited: bool,
}

impl RetryPolicy {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
            rate_limited: false,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited
    }

    pub fn is_exhausted(&self) -> bool {
        self.consecutive_failures >= self.config.max_retries
    }

    /// Back to initial values. Called on entry to `Listening`.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.rate_limited = false;
    }

    /// Count one failure and decide whether to retry.
    pub fn record_failure(&mut self, rate_limited: bool) -> RetryDecision {
        self.record_failure_with(rate_limited, &mut rand::thread_rng())
    }

    pub fn record_failure_with<R: Rng + ?Sized>(
        &mut self,
        rate_limited: bool,
        rng: &mut R,
    ) -> RetryDecision {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.rate_limited = rate_limited;

        if self.is_exhausted() {
            return RetryDecision::GiveUp {
                failures: self.consecutive_failures,
            };
        }

        let mut base = self.base_delay(self.consecutive_failures);
        if rate_limited {
            base = base.max(self.config.rate_limit_floor);
        }
        RetryDecision::Retry {
            attempt: self.consecutive_failures,
            base,
            delay: base + jitter(base, self.config.jitter_ratio, rng),
        }
    }

    /// Pre-jitter delay after the `failures`-th consecutive failure.
    ///
    /// `min(initial × growth^(failures − 1), max_delay)`; the first retry
    /// waits `initial_delay`.
    pub fn base_delay(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.config.initial_delay.as_secs_f64() * self.config.growth.powi(exponent);
        let capped = secs.min(self.config.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

/// Uniform jitter in `[0, ratio × delay]`.
pub fn jitter<R: Rng + ?Sized>(delay: Duration, ratio: f64, rng: &mut R) -> Duration {
    let max = delay.as_secs_f64() * ratio;
    if max <= 0.0 || !max.is_finite() {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(rng.gen_range(0.0..=max))
}
