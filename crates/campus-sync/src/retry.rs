//! # Retry Policy
//!
//! Backoff between whole-pass retries. The scheduler consumes this; the
//! orchestrator only says whether a pass should be retried.
//!
//! ## Delay Curves
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  base = 30s, max = 300s, max_attempts = 5                               │
//! │                                                                         │
//! │  attempt      1      2      3      4      5      6                      │
//! │  LINEAR      30s    60s    90s   120s   150s   (none)                   │
//! │  EXPONENTIAL 30s    60s   120s   240s   300s   (none)                   │
//! │                                                                         │
//! │  Both are capped at max_delay and stop after max_attempts retries.     │
//! │  No jitter.                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};

/// Shape of the delay curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// `base * attempt`
    #[default]
    Linear,

    /// `base * 2^(attempt - 1)`
    Exponential,
}

impl std::fmt::Display for BackoffKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackoffKind::Linear => write!(f, "linear"),
            BackoffKind::Exponential => write!(f, "exponential"),
        }
    }
}

/// Retry configuration attached to scheduled passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub kind: BackoffKind,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Retries after the first attempt.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::linear(Duration::from_secs(30), 5)
    }
}

impl RetryPolicy {
    /// Linear backoff capped at one hour.
    pub fn linear(base_delay: Duration, max_attempts: u32) -> Self {
        RetryPolicy {
            kind: BackoffKind::Linear,
            base_delay,
            max_delay: Duration::from_secs(3600),
            max_attempts,
        }
    }

    /// Exponential backoff capped at one hour.
    pub fn exponential(base_delay: Duration, max_attempts: u32) -> Self {
        RetryPolicy {
            kind: BackoffKind::Exponential,
            ..RetryPolicy::linear(base_delay, max_attempts)
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        RetryPolicy::linear(Duration::ZERO, 0)
    }

    /// Sets the delay cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// A fresh backoff sequence for one run of retries.
    pub fn backoff(&self) -> Box<dyn Backoff + Send> {
        match self.kind {
            BackoffKind::Linear => Box::new(LinearBackoff::new(
                self.base_delay,
                self.max_delay,
                self.max_attempts,
            )),
            BackoffKind::Exponential => {
                let inner = ExponentialBackoff {
                    current_interval: self.base_delay,
                    initial_interval: self.base_delay,
                    randomization_factor: 0.0,
                    multiplier: 2.0,
                    max_interval: self.max_delay,
                    max_elapsed_time: None,
                    ..Default::default()
                };
                Box::new(Limited::new(inner, self.max_attempts))
            }
        }
    }
}

// =============================================================================
// Linear Backoff
// =============================================================================

/// `base * attempt`, capped, for at most `max_attempts` delays.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    base: Duration,
    max: Duration,
    attempt: u32,
    max_attempts: u32,
}

impl LinearBackoff {
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        LinearBackoff {
            base,
            max,
            attempt: 0,
            max_attempts,
        }
    }
}

impl Backoff for LinearBackoff {
    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        self.attempt += 1;

        let delay = self.base.checked_mul(self.attempt).unwrap_or(self.max);
        Some(delay.min(self.max))
    }
}

// =============================================================================
// Attempt Limit
// =============================================================================

/// Stops an unbounded backoff after `max_attempts` delays.
struct Limited<B> {
    inner: B,
    used: u32,
    max_attempts: u32,
}

impl<B> Limited<B> {
    fn new(inner: B, max_attempts: u32) -> Self {
        Limited {
            inner,
            used: 0,
            max_attempts,
        }
    }
}

impl Backoff for Limited<ExponentialBackoff> {
    fn reset(&mut self) {
        self.used = 0;
        self.inner.reset();
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.used >= self.max_attempts {
            return None;
        }
        self.used += 1;
        self.inner.next_backoff()
    }
}
