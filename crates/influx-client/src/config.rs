// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML configuration for the client.

use crate::error::{Error, Result};
use crate::options::WriteOptions;
use crate::point::WritePrecision;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Client-level configuration.
///
/// ```yaml
/// url: "http://localhost:8086"
/// token: "my-token"
/// org: "my-org"
/// bucket: "my-bucket"
/// precision: ms
/// tags:
///   host: "${env.HOSTNAME}"
/// write:
///   mode: batching
///   batch_size: 500
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Server URL (e.g., "http://localhost:8086").
    pub url: String,
    /// Authentication token.
    pub token: String,
    /// Default organization.
    #[serde(default)]
    pub org: Option<String>,
    /// Default bucket.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Default write precision.
    #[serde(default)]
    pub precision: WritePrecision,
    /// Whole-request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Default tags applied to every structured point.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Write API options.
    #[serde(default)]
    pub write: WriteOptions,
}

fn default_timeout() -> u64 {
    10_000
}

fn default_max_redirects() -> usize {
    10
}

// Manual impl so the token never ends up in logs.
impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("precision", &self.precision)
            .field("timeout_ms", &self.timeout_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("max_redirects", &self.max_redirects)
            .field("tags", &self.tags)
            .field("write", &self.write)
            .finish()
    }
}

impl ClientOptions {
    /// Options with defaults for everything but the connection.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            org: None,
            bucket: None,
            precision: WritePrecision::default(),
            timeout_ms: default_timeout(),
            connect_timeout_ms: default_timeout(),
            max_redirects: default_max_redirects(),
            tags: BTreeMap::new(),
            write: WriteOptions::default(),
        }
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ClientOptions = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Config("url must not be empty".into()));
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "url must use http or https scheme: {}",
                self.url
            )));
        }
        self.write.validate()
    }

    pub fn org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn precision(mut self, precision: WritePrecision) -> Self {
        self.precision = precision;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Adds a client-level default tag (`${env.NAME}` references allowed).
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn write_options(mut self, write: WriteOptions) -> Self {
        self.write = write;
        self
    }
}
