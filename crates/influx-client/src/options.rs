// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Write path options.
//!
//! [`WriteOptions`] selects the write mode and tunes batching and retry.
//! [`PointSettings`] carries default tags merged into every structured point.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// How `write` calls reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Every `write` call performs its HTTP requests before returning.
    #[default]
    Synchronous,
    /// Lines are queued and flushed by background threads.
    Batching,
}

/// Batching and retry tuning.
///
/// All durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOptions {
    #[serde(default)]
    pub mode: WriteMode,

    /// Maximum number of lines per HTTP request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Time-triggered flush period.
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,

    /// First backoff delay.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound of a single backoff delay.
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,

    /// Upper bound of the whole retry sequence of one batch.
    #[serde(default = "default_max_retry_time")]
    pub max_retry_time_ms: u64,

    #[serde(default = "default_exponential_base")]
    pub exponential_base: u32,

    /// Random delay added before each batch submission and to server
    /// `Retry-After` hints.
    #[serde(default)]
    pub jitter_interval_ms: u64,

    /// Report terminal batch failures on the error channel instead of
    /// only logging them.
    #[serde(default)]
    pub abort_on_exception: bool,
}

fn default_batch_size() -> usize {
    1_000
}

fn default_flush_interval() -> u64 {
    1_000
}

fn default_retry_interval() -> u64 {
    5_000
}

fn default_max_retries() -> u32 {
    5
}

fn default_max_retry_delay() -> u64 {
    125_000
}

fn default_max_retry_time() -> u64 {
    180_000
}

fn default_exponential_base() -> u32 {
    2
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            mode: WriteMode::default(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval(),
            retry_interval_ms: default_retry_interval(),
            max_retries: default_max_retries(),
            max_retry_delay_ms: default_max_retry_delay(),
            max_retry_time_ms: default_max_retry_time(),
            exponential_base: default_exponential_base(),
            jitter_interval_ms: 0,
            abort_on_exception: false,
        }
    }
}

impl WriteOptions {
    /// Create a new builder.
    pub fn builder() -> WriteOptionsBuilder {
        WriteOptionsBuilder::default()
    }

    /// Options for batching mode with defaults otherwise.
    pub fn batching() -> Self {
        Self {
            mode: WriteMode::Batching,
            ..Self::default()
        }
    }

    /// Reject combinations the worker and retry policy cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be greater than 0".into()));
        }
        if self.retry_interval_ms == 0 {
            return Err(Error::Config(
                "retry_interval_ms must be greater than 0".into(),
            ));
        }
        if self.max_retries == 0 {
            return Err(Error::Config("max_retries must be greater than 0".into()));
        }
        if self.exponential_base < 2 {
            return Err(Error::Config(format!(
                "exponential_base must be at least 2, got {}",
                self.exponential_base
            )));
        }
        if self.retry_interval_ms > self.max_retry_delay_ms {
            return Err(Error::Config(format!(
                "retry_interval_ms ({}) cannot be greater than max_retry_delay_ms ({})",
                self.retry_interval_ms, self.max_retry_delay_ms
            )));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn max_retry_time(&self) -> Duration {
        Duration::from_millis(self.max_retry_time_ms)
    }
}

/// Builder for [`WriteOptions`].
#[derive(Debug, Default)]
pub struct WriteOptionsBuilder {
    options: Option<WriteOptions>,
}

impl WriteOptionsBuilder {
    fn with(mut self, f: impl FnOnce(&mut WriteOptions)) -> Self {
        let mut options = self.options.take().unwrap_or_default();
        f(&mut options);
        self.options = Some(options);
        self
    }

    /// Set write mode.
    pub fn mode(self, mode: WriteMode) -> Self {
        self.with(|o| o.mode = mode)
    }

    /// Set maximum lines per request.
    pub fn batch_size(self, size: usize) -> Self {
        self.with(|o| o.batch_size = size)
    }

    /// Set time-triggered flush period.
    pub fn flush_interval(self, interval: Duration) -> Self {
        self.with(|o| o.flush_interval_ms = duration_ms(interval))
    }

    /// Set first backoff delay.
    pub fn retry_interval(self, interval: Duration) -> Self {
        self.with(|o| o.retry_interval_ms = duration_ms(interval))
    }

    /// Set maximum retry attempts.
    pub fn max_retries(self, retries: u32) -> Self {
        self.with(|o| o.max_retries = retries)
    }

    /// Set backoff delay cap.
    pub fn max_retry_delay(self, delay: Duration) -> Self {
        self.with(|o| o.max_retry_delay_ms = duration_ms(delay))
    }

    /// Set total retry time cap.
    pub fn max_retry_time(self, time: Duration) -> Self {
        self.with(|o| o.max_retry_time_ms = duration_ms(time))
    }

    /// Set backoff growth factor.
    pub fn exponential_base(self, base: u32) -> Self {
        self.with(|o| o.exponential_base = base)
    }

    /// Set submission jitter.
    pub fn jitter_interval(self, jitter: Duration) -> Self {
        self.with(|o| o.jitter_interval_ms = duration_ms(jitter))
    }

    /// Report terminal batch failures on the error channel.
    pub fn abort_on_exception(self, abort: bool) -> Self {
        self.with(|o| o.abort_on_exception = abort)
    }

    /// Build and validate the options.
    pub fn build(self) -> Result<WriteOptions> {
        let options = self.options.unwrap_or_default();
        options.validate()?;
        Ok(options)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Default tags applied to every structured point.
///
/// A value of the form `${env.NAME}` is read from the environment when the
/// point is encoded; the tag is dropped if the variable is unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointSettings {
    #[serde(default)]
    pub default_tags: BTreeMap<String, String>,
}

impl PointSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a default tag.
    pub fn add_default_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_tags.insert(key.into(), value.into());
        self
    }

    /// Default tags with environment references resolved.
    pub fn resolved_tags(&self) -> BTreeMap<String, String> {
        resolve_tags(&self.default_tags)
    }
}

/// Resolve `${env.NAME}` references, dropping unset ones.
pub(crate) fn resolve_tags(tags: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    tags.iter()
        .filter_map(|(key, value)| {
            let resolved = match env_reference(value) {
                Some(name) => std::env::var(name).ok()?,
                None => value.clone(),
            };
            Some((key.clone(), resolved))
        })
        .collect()
}

fn env_reference(value: &str) -> Option<&str> {
    value
        .strip_prefix("${env.")
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = WriteOptions::default();
        assert_eq!(options.mode, WriteMode::Synchronous);
        assert_eq!(options.batch_size, 1_000);
        assert_eq!(options.flush_interval_ms, 1_000);
        assert_eq!(options.retry_interval_ms, 5_000);
        assert_eq!(options.max_retries, 5);
        assert_eq!(options.max_retry_delay_ms, 125_000);
        assert_eq!(options.max_retry_time_ms, 180_000);
        assert_eq!(options.exponential_base, 2);
        assert_eq!(options.jitter_interval_ms, 0);
        assert!(!options.abort_on_exception);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let options = WriteOptions::builder()
            .mode(WriteMode::Batching)
            .batch_size(10)
            .flush_interval(Duration::from_millis(50))
            .retry_interval(Duration::from_millis(100))
            .max_retries(3)
            .max_retry_delay(Duration::from_secs(1))
            .exponential_base(3)
            .jitter_interval(Duration::from_millis(5))
            .abort_on_exception(true)
            .build()
            .expect("valid options");

        assert_eq!(options.mode, WriteMode::Batching);
        assert_eq!(options.batch_size, 10);
        assert_eq!(options.flush_interval(), Duration::from_millis(50));
        assert_eq!(options.retry_interval_ms, 100);
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.max_retry_delay_ms, 1_000);
        assert_eq!(options.exponential_base, 3);
        assert_eq!(options.jitter_interval_ms, 5);
        assert!(options.abort_on_exception);
    }

    #[test]
    fn test_invalid_combinations_fail_at_build() {
        assert!(matches!(
            WriteOptions::builder().batch_size(0).build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            WriteOptions::builder().retry_interval(Duration::ZERO).build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            WriteOptions::builder().max_retries(0).build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            WriteOptions::builder().exponential_base(1).build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            WriteOptions::builder()
                .retry_interval(Duration::from_secs(10))
                .max_retry_delay(Duration::from_secs(5))
                .build(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_deserialize_partial_yaml() {
        let yaml = "mode: batching\nbatch_size: 2\n";
        let options: WriteOptions = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(options.mode, WriteMode::Batching);
        assert_eq!(options.batch_size, 2);
        assert_eq!(options.retry_interval_ms, 5_000);
    }

    #[test]
    fn test_negative_duration_rejected_by_deserializer() {
        let yaml = "flush_interval_ms: -1\n";
        assert!(serde_yaml::from_str::<WriteOptions>(yaml).is_err());
    }

    #[test]
    fn test_point_settings_env_expansion() {
        std::env::set_var("INFLUX_CLIENT_TEST_DC", "LA");
        std::env::remove_var("INFLUX_CLIENT_TEST_UNSET");

        let settings = PointSettings::new()
            .add_default_tag("id", "132-987-655")
            .add_default_tag("data_center", "${env.INFLUX_CLIENT_TEST_DC}")
            .add_default_tag("missing", "${env.INFLUX_CLIENT_TEST_UNSET}");

        let tags = settings.resolved_tags();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["id"], "132-987-655");
        assert_eq!(tags["data_center"], "LA");
    }

    #[test]
    fn test_env_reference_shape() {
        assert_eq!(env_reference("${env.HOME}"), Some("HOME"));
        assert_eq!(env_reference("${env.}"), None);
        assert_eq!(env_reference("${HOME}"), None);
        assert_eq!(env_reference("plain"), None);
    }
}
