// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sleeping and retry delays.
//!
//! Both the API retry loop and wake-up polling block on a `Sleeper`, so
//! tests can record the delays instead of waiting for them.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Retry policy for transport failures.
pub trait RetryPolicy: Send + Sync {
    /// Total attempts, including the first one.
    fn max_attempts(&self) -> u32;

    /// Delay after the failed attempt number `attempt` (1-based).
    fn delay(&self, attempt: u32) -> Duration;
}

/// Waits `step * attempt` after each failure: 3s, 6s, 9s, ...
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    pub max_attempts: u32,
    pub step: Duration,
}

impl LinearBackoff {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            step: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy for LinearBackoff {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt)
    }
}
