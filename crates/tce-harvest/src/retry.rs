//! Linear retry schedule.

use std::time::Duration;

use backon::BackoffBuilder;
use tce_core::config::RetryConfig;

/// Backoff that waits `step × n` before retry `n`.
///
/// `max_attempts` counts the first try, so a builder with three attempts
/// yields two delays: `step` and `2 × step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    step: Duration,
    max_attempts: usize,
}

impl LinearBackoff {
    /// Creates a schedule. `max_attempts` of zero is treated as one.
    pub fn new(step: Duration, max_attempts: usize) -> Self {
        Self {
            step,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Schedule from the retry configuration.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.step(), config.max_attempts)
    }

    /// Attempts including the first.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay before each retry, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.build().collect()
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl BackoffBuilder for LinearBackoff {
    type Backoff = LinearDelays;

    fn build(self) -> Self::Backoff {
        LinearDelays {
            step: self.step,
            retry: 0,
            retries: self.max_attempts.saturating_sub(1),
        }
    }
}

/// Iterator of delays produced by [`LinearBackoff`].
#[derive(Debug, Clone)]
pub struct LinearDelays {
    step: Duration,
    retry: usize,
    retries: usize,
}

impl Iterator for LinearDelays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.retry >= self.retries {
            return None;
        }
        self.retry += 1;
        let n = u32::try_from(self.retry).unwrap_or(u32::MAX);
        Some(self.step.saturating_mul(n))
    }
}
