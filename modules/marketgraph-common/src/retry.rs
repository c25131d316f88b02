//! Bounded, fixed-delay retry for connecting to stores that may still be
//! starting up (container start-up races). Not exponential: the dependency
//! is expected to come up within a handful of attempts.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

/// Waits between attempts. Swapped for a recording fake in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

/// Every attempt failed. Carries the last underlying error.
#[derive(Debug, thiserror::Error)]
#[error("{what} failed after {attempts} attempts: {last}")]
pub struct RetryExhausted<E: std::fmt::Display + std::fmt::Debug> {
    pub what: String,
    pub attempts: u32,
    pub last: E,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number. The sleeper is only
    /// invoked between attempts, never after the final one.
    pub async fn run<T, E, F, Fut>(
        &self,
        sleeper: &dyn Sleeper,
        what: &str,
        mut op: F,
    ) -> Result<T, RetryExhausted<E>>
    where
        E: std::fmt::Display + std::fmt::Debug,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(what, attempt, "Connected after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < max => {
                    warn!(
                        what,
                        attempt,
                        max_attempts = max,
                        delay_secs = self.delay.as_secs_f64(),
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    sleeper.sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(RetryExhausted {
                        what: what.to_string(),
                        attempts: attempt,
                        last: e,
                    });
                }
            }
        }
    }
}
