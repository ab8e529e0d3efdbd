use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use shared_config::BookingSettings;

use crate::error::classify;

/// Bounded exponential backoff for reads against the hosted backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &BookingSettings) -> Self {
        Self {
            max_attempts: settings.retry_attempts.max(1),
            base_delay: settings.retry_base_delay(),
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Runs `operation` until it succeeds, fails permanently, or attempts run out.
    pub async fn retry<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let permanent = classify(&e).map(|err| !err.is_transient()).unwrap_or(false);
                    if permanent || attempt >= max_attempts {
                        warn!("{} failed after {} attempt(s): {}", label, attempt, e);
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!("{} failed (attempt {}/{}), retrying in {:?}: {}",
                          label, attempt, max_attempts, delay, e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPriority {
    /// Needed to render the first booking step; never waits for a queue slot.
    Essential,
    /// Everything else; waits for one of the bounded in-flight slots.
    Deferred,
}

/// Small request queue: caps in-flight deferred reads and retries every read.
pub struct RequestQueue {
    policy: RetryPolicy,
    permits: Semaphore,
}

impl RequestQueue {
    pub fn new(policy: RetryPolicy, max_concurrent: usize) -> Self {
        Self {
            policy,
            permits: Semaphore::new(max_concurrent.max(1)),
        }
    }

    pub fn from_settings(settings: &BookingSettings) -> Self {
        Self::new(RetryPolicy::from_settings(settings), settings.max_concurrent_requests)
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn run<T, F, Fut>(&self, priority: RequestPriority, label: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _permit = match priority {
            RequestPriority::Essential => None,
            RequestPriority::Deferred => Some(self.permits.acquire().await?),
        };

        debug!("Running {} ({:?})", label, priority);
        self.policy.retry(label, operation).await
    }
}
