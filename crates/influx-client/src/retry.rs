// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Exponential backoff with jitter for write requests.
//!
//! The delay range for attempt `n` (1-based) is
//! `[retry_interval * base^(n-1), retry_interval * base^n)`, with the upper
//! end capped at `max_retry_delay`. Once the cap is reached the range stops
//! growing. A server `Retry-After` hint replaces the backoff delay.

use crate::error::Result;
use crate::options::WriteOptions;
use std::time::{Duration, Instant};

/// Retry policy for a single batch submission.
#[derive(Debug, Clone)]
pub struct WriteRetry {
    max_retries: u32,
    retry_interval_ms: u64,
    max_retry_delay_ms: u64,
    max_retry_time: Duration,
    exponential_base: u64,
    jitter_interval_ms: u64,
}

impl WriteRetry {
    /// Build the policy from already validated options.
    pub fn new(options: &WriteOptions) -> Self {
        Self {
            max_retries: options.max_retries,
            retry_interval_ms: options.retry_interval_ms,
            max_retry_delay_ms: options.max_retry_delay_ms,
            max_retry_time: options.max_retry_time(),
            exponential_base: u64::from(options.exponential_base),
            jitter_interval_ms: options.jitter_interval_ms,
        }
    }

    /// Backoff range `(start, stop)` in milliseconds for `attempt`.
    pub fn backoff_range(&self, attempt: u32) -> (u64, u64) {
        let mut start = self.retry_interval_ms;
        let mut stop = self.retry_interval_ms.saturating_mul(self.exponential_base);

        let mut i = 1;
        while i < attempt {
            i += 1;
            start = stop;
            stop = stop.saturating_mul(self.exponential_base);
            if stop > self.max_retry_delay_ms {
                break;
            }
        }

        let stop = stop.min(self.max_retry_delay_ms);
        (start.min(stop), stop)
    }

    /// Random delay drawn from [`WriteRetry::backoff_range`].
    pub fn backoff_time(&self, attempt: u32) -> Duration {
        let (start, stop) = self.backoff_range(attempt);
        let ms = if stop > start {
            fastrand::u64(start..stop)
        } else {
            start
        };
        Duration::from_millis(ms)
    }

    /// Random delay in `[0, jitter_interval)`, zero when jitter is disabled.
    pub fn jitter_delay(&self) -> Duration {
        if self.jitter_interval_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(0..self.jitter_interval_ms))
        }
    }

    /// Run `operation` until it succeeds, fails terminally, or the attempt
    /// or time budget is exhausted. The closure receives the 1-based
    /// attempt number.
    pub fn retry<T, F>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let start_time = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            let err = match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            if attempt > self.max_retries {
                log::error!("[influx-retry] Maximum retry attempts reached.");
                return Err(err);
            }

            if start_time.elapsed() > self.max_retry_time {
                log::error!(
                    "[influx-retry] Maximum retry time {} ms exceeded",
                    self.max_retry_time.as_millis()
                );
                return Err(err);
            }

            let delay = match err.retry_after() {
                Some(hint) => hint + self.jitter_delay(),
                None => self.backoff_time(attempt),
            };

            log::warn!(
                "[influx-retry] The retriable error occurred during writing of data. Reason: '{}'. Retry in: {}s.",
                err,
                delay.as_secs_f64()
            );

            std::thread::sleep(delay);
        }
    }
}
