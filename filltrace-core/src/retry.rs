use crate::error::{FilltraceError, Result};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff settings for calls to the remote node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries)
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-indexed): `base_delay * 2^(retry - 1)`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32
            .checked_pow(retry.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Runs single network calls, retrying rate-limited ones with exponential
/// backoff. Any other error is returned on the first attempt.
#[derive(Debug, Default)]
pub struct RetryScheduler {
    config: RetryConfig,
    retries: AtomicU64,
}

impl RetryScheduler {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            retries: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Number of retries performed over the scheduler's lifetime
    pub fn total_retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Run `operation` until it succeeds, fails with a non-transient error,
    /// or runs out of retries. Exhaustion is reported as
    /// [`FilltraceError::RetryExhausted`].
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0u32;

        loop {
            let err = match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !e.is_transient() => {
                    debug!("{} failed without retry: {}", label, e);
                    return Err(e);
                }
                Err(e) => e,
            };

            if retry >= self.config.max_retries {
                return Err(FilltraceError::RetryExhausted {
                    attempts: retry + 1,
                    last_error: err.to_string(),
                });
            }

            retry += 1;
            self.retries.fetch_add(1, Ordering::Relaxed);
            let delay = self.config.delay_for(retry);
            warn!(
                "Rate limit hit on {} (attempt {}/{}). Retrying in {:?}...",
                label,
                retry,
                self.config.max_retries + 1,
                delay
            );
            sleep(delay).await;
        }
    }
}
