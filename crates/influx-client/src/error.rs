// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the InfluxDB client.
//!
//! [`InfluxError`] carries everything the server (or the transport) told us
//! about a failed HTTP exchange. [`Error`] is the crate-wide taxonomy that
//! callers match on to tell "your data was malformed" from "the server is
//! overloaded" from "the network is down".

use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause attached to an [`InfluxError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a single HTTP exchange with InfluxDB.
#[derive(Debug)]
pub struct InfluxError {
    /// Human readable message (server `message` field when available).
    pub message: String,
    /// HTTP status code, `None` when the server was never reached.
    pub status: Option<u16>,
    /// Server reference code (the `code` field of the error body).
    pub reference: Option<String>,
    /// Parsed `Retry-After` hint.
    pub retry_after: Option<Duration>,
    /// The request never got a status: connection refused, reset, timeout.
    pub connection_error: bool,
    /// Underlying cause, if any.
    pub source: Option<BoxError>,
}

/// JSON error body returned by the v2 API (`code`/`message`) and by 1.8
/// compatibility endpoints (`error`).
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl InfluxError {
    /// Build an error from a non-success HTTP response.
    pub fn from_response(status: u16, headers: &[(String, String)], body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

        let message = parsed
            .message
            .or(parsed.error)
            .filter(|m| !m.is_empty())
            .or_else(|| header_value(headers, "X-Influxdb-Error").map(str::to_string))
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    format!("HTTP status {}", status)
                } else {
                    trimmed.to_string()
                }
            });

        Self {
            message,
            status: Some(status),
            reference: parsed.code.filter(|c| !c.is_empty()),
            retry_after: header_value(headers, "Retry-After").and_then(parse_retry_after),
            connection_error: false,
            source: None,
        }
    }

    /// Build an error that carries only a message.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            reference: None,
            retry_after: None,
            connection_error: false,
            source: None,
        }
    }

    /// Transport-level failure: the request never reached the server.
    pub fn connection(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            connection_error: true,
            source: Some(source.into()),
            ..Self::from_message(message)
        }
    }

    /// Attach a cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Rate limited (429), server side (5xx) or connection failure.
    pub fn is_retryable(&self) -> bool {
        if self.connection_error {
            return true;
        }
        matches!(self.status, Some(status) if status == 429 || status >= 500)
    }
}

impl fmt::Display for InfluxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.reference) {
            (Some(status), Some(reference)) => {
                write!(f, "HTTP {} ({}): {}", status, reference, self.message)
            }
            (Some(status), None) => write!(f, "HTTP {}: {}", status, self.message),
            (None, _) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for InfluxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing bucket/org/precision or invalid options. Never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection refused, reset or timed out.
    #[error("transport error: {0}")]
    Transport(InfluxError),

    /// HTTP 429 or 5xx.
    #[error("server error: {0}")]
    Server(InfluxError),

    /// HTTP 4xx other than 429.
    #[error("client error: {0}")]
    Client(InfluxError),

    /// Error table embedded in an otherwise successful query response.
    #[error("query error: {message} (reference {reference})")]
    Query { message: String, reference: u32 },

    /// Malformed annotated CSV.
    #[error("CSV parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The client or write API has been closed.
    #[error("client is closed")]
    Closed,
}

impl Error {
    /// Whether the retry policy may try the operation again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(e) | Error::Server(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// The HTTP-level details, for transport/server/client errors.
    pub fn influx_error(&self) -> Option<&InfluxError> {
        match self {
            Error::Transport(e) | Error::Server(e) | Error::Client(e) => Some(e),
            _ => None,
        }
    }

    /// Server-supplied `Retry-After` hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        self.influx_error().and_then(|e| e.retry_after)
    }

    /// HTTP status code, if the server answered.
    pub fn status(&self) -> Option<u16> {
        self.influx_error().and_then(|e| e.status)
    }
}

impl From<InfluxError> for Error {
    fn from(e: InfluxError) -> Self {
        if e.connection_error {
            return Error::Transport(e);
        }
        match e.status {
            Some(status) if status == 429 || status >= 500 => Error::Server(e),
            Some(_) => Error::Client(e),
            None => Error::Transport(e),
        }
    }
}

/// Case-insensitive header lookup.
pub(crate) fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// `Retry-After` is a number of seconds; decimals are tolerated. Values a
/// `Duration` cannot hold are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}
