// SPDX-License-Identifier: MIT

//! Restart backoff computation.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// `base_delay × attempt`
    Linear,
    /// `base_delay × 2^(attempt − 1)`
    Exponential,
}

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub strategy: BackoffStrategy,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Restart attempts before the process gives up
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

/// Delay before restart attempt `attempt` (1-based), capped at `max_delay`.
pub fn delay_for(config: &BackoffConfig, attempt: u32) -> Duration {
    let attempt = attempt.max(1);
    let delay = match config.strategy {
        BackoffStrategy::Linear => config.base_delay.saturating_mul(attempt),
        BackoffStrategy::Exponential => {
            let factor = 2u32.saturating_pow(attempt - 1);
            config.base_delay.saturating_mul(factor)
        }
    };
    delay.min(config.max_delay)
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
