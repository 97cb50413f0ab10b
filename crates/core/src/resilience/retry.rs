use std::time::Duration;

use rand::Rng;

/// Retry tuning for one dependency
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,

    /// Backoff before the first retry
    pub base_delay: Duration,

    /// Ceiling the exponential backoff is clamped to
    pub max_delay: Duration,

    /// Growth factor between consecutive backoffs
    pub multiplier: f64,

    /// Jitter fraction; each delay is scaled by a factor in [1-j, 1+j]
    pub jitter: f64,

    /// Deadline applied to every individual attempt
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.2,
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Total calls this policy permits, counting the first attempt
    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Backoff before the retry that follows the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let raw_ms = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_ms = raw_ms.min(self.max_delay.as_millis() as f64);

        let factor = if self.jitter > 0.0 {
            1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter)
        } else {
            1.0
        };

        Duration::from_millis((capped_ms * factor.max(0.0)) as u64)
    }
}
