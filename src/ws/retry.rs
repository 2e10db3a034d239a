//! Consecutive-failure accounting for the reconnection loop.

use std::time::Duration;

use crate::ws::config::WsConfig;

/// What the loop should do after a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry right away (first consecutive failure).
    Immediate,
    /// Wait, then retry.
    Backoff(Duration),
    /// Give up; the loop terminates with a fatal error.
    Exhausted {
        /// Consecutive failures observed.
        attempts: u32,
    },
}

/// Counts consecutive transport failures.
///
/// Reset on every successful entry into streaming.
#[derive(Debug, Clone)]
pub struct RetryCounter {
    failures: u32,
    max_retries: u32,
    backoff: Duration,
}

impl RetryCounter {
    /// Create a counter that tolerates `max_retries` consecutive failures.
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            failures: 0,
            max_retries,
            backoff,
        }
    }

    /// Create a counter from the loop configuration.
    pub fn from_config(config: &WsConfig) -> Self {
        Self::new(config.max_retries, config.retry_backoff)
    }

    /// Record one failure and decide how to proceed.
    pub fn record_failure(&mut self) -> RetryDecision {
        self.failures = self.failures.saturating_add(1);

        if self.failures > self.max_retries {
            RetryDecision::Exhausted {
                attempts: self.failures,
            }
        } else if self.failures > 1 {
            RetryDecision::Backoff(self.backoff)
        } else {
            RetryDecision::Immediate
        }
    }

    /// Clear the failure count.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures since the last reset.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
