//! Timeout, retry and cancellation around any [`Fetch`] implementation.
//!
//! # Retry Strategy
//!
//! - Each attempt is bounded by the configured request timeout
//! - Transient failures (timeout, network, 5xx) are retried up to the attempt bound
//! - A fixed backoff separates attempts
//! - The run's cancellation token aborts both the attempt and the backoff sleep

use super::{Fetch, FetchError, RawFetchResult};
use crate::config::Settings;
use crate::models::Source;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Decorator that adds bounded retries to a [`Fetch`] implementation.
pub struct RetryFetch<T> {
    /// The underlying fetcher.
    inner: T,
    /// Total attempts, including the first.
    attempts: usize,
    /// Upper bound on a single attempt.
    attempt_timeout: Duration,
    /// Fixed pause between attempts.
    backoff: Duration,
    cancel: CancellationToken,
}

impl<T> RetryFetch<T>
where
    T: Fetch,
{
    pub fn new(
        inner: T,
        attempts: usize,
        attempt_timeout: Duration,
        backoff: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            attempt_timeout,
            backoff,
            cancel,
        }
    }

    pub fn from_settings(inner: T, settings: &Settings, cancel: CancellationToken) -> Self {
        Self::new(
            inner,
            settings.fetch_attempts,
            settings.request_timeout(),
            settings.retry_backoff(),
            cancel,
        )
    }

    async fn attempt(&self, source: &Source) -> RawFetchResult {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
            res = timeout(self.attempt_timeout, self.inner.fetch(source)) => {
                res.unwrap_or(Err(FetchError::Timeout))
            }
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("attempts", &self.attempts)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl<T> Fetch for RetryFetch<T>
where
    T: Fetch,
{
    #[instrument(level = "debug", skip_all, fields(source = %source.name))]
    async fn fetch(&self, source: &Source) -> RawFetchResult {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            let err = match self.attempt(source).await {
                Ok(payload) => return Ok(payload),
                Err(e) => e,
            };

            if !err.is_transient() || attempt >= self.attempts {
                debug!(
                    attempt,
                    max = self.attempts,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %err,
                    "fetch() giving up"
                );
                return Err(err);
            }

            warn!(
                attempt,
                max = self.attempts,
                elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                delay = ?self.backoff,
                error = %err,
                "fetch() attempt failed; backing off"
            );
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = sleep(self.backoff) => {}
            }
        }
    }
}
