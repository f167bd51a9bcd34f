//! Rate-limit backoff
//!
//! The backoff is a small state machine driven by response statuses:
//!
//! ```text
//! Requesting ──200──▶ Done(Success)
//!     │ 429                      ▲
//!     ▼                          │ 200
//! Backoff(1) ──non-200──▶ Backoff(2) ... Backoff(max) ──non-200──▶ Done(Abandoned)
//! ```
//!
//! Any other status seen while `Requesting` goes straight to
//! `Done(Abandoned)`. [`BackoffPolicy::transition`] is pure; waiting is left
//! to a [`Sleeper`] so tests never sleep.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::{DEFAULT_BACKOFF_BASE, DEFAULT_MAX_ATTEMPTS};

const STATUS_OK: u16 = 200;
const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Where a request currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Requesting,
    /// Waiting before retry number `n` (1-based)
    Backoff(u32),
    Done(RetryOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Success,
    /// `attempts` is the number of retries that were issued
    Abandoned { status: u16, attempts: u32 },
}

/// Linear-step backoff: retry `n` waits `n * base_delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay }
    }

    /// Wait before retry `attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Next state after observing `status` in `state`
    pub fn transition(&self, state: RetryState, status: u16) -> RetryState {
        match state {
            RetryState::Requesting => match status {
                STATUS_OK => RetryState::Done(RetryOutcome::Success),
                STATUS_TOO_MANY_REQUESTS if self.max_attempts > 0 => RetryState::Backoff(1),
                _ => RetryState::Done(RetryOutcome::Abandoned { status, attempts: 0 }),
            },
            RetryState::Backoff(n) => {
                if status == STATUS_OK {
                    RetryState::Done(RetryOutcome::Success)
                } else if n < self.max_attempts {
                    RetryState::Backoff(n + 1)
                } else {
                    RetryState::Done(RetryOutcome::Abandoned { status, attempts: n })
                }
            }
            done @ RetryState::Done(_) => done,
        }
    }
}

/// Blocking wait between retries
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[async_trait]
impl<T: Sleeper + ?Sized> Sleeper for &T {
    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
