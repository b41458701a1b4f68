use crate::fetch::error::FetchError;
use crate::fetch::{ArchiveFetcher, ArchiveQuery};
use log::warn;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// Exponential backoff settings for [`RetryingFetcher`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.saturating_sub(1) as i32);
        self.initial_backoff.mul_f64(factor.max(0.0))
    }
}

/// Retries a fetcher on transient failures with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryingFetcher<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F: ArchiveFetcher> RetryingFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    pub fn with_policy(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<F: ArchiveFetcher> ArchiveFetcher for RetryingFetcher<F> {
    fn fetch(&self, query: &ArchiveQuery) -> Result<PathBuf, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.fetch(query) {
                Ok(path) => return Ok(path),
                Err(e) if e.is_permanent() => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    return Err(FetchError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    })
                }
                Err(e) => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        "Fetching {} for {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        query.dataset, query.area_name, attempt, max_attempts, e, delay
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}
