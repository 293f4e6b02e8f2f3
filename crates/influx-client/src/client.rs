// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client entry point.
//!
//! [`InfluxClient`] owns the configuration and the transport and hands out
//! the write, query and delete APIs. Closing the client closes every
//! [`WriteApi`] it created, flushing their queues.

use crate::config::ClientOptions;
use crate::delete_api::DeleteApi;
use crate::error::{Error, InfluxError, Result};
use crate::options::{PointSettings, WriteOptions};
use crate::query_api::QueryApi;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::worker::{BatchItemKey, BatchWriter};
use crate::write_api::{WriteApi, WriteApiInner};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Value of the `User-Agent` header.
pub const USER_AGENT: &str = concat!("influx-client-rust/", env!("CARGO_PKG_VERSION"));

/// Configuration and transport shared by all APIs of one client.
pub(crate) struct ApiContext {
    pub(crate) options: ClientOptions,
    transport: Arc<dyn HttpTransport>,
}

impl ApiContext {
    /// Send with authentication, turning non-2xx statuses into errors.
    pub(crate) fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut request = request.header("User-Agent", USER_AGENT);
        if !self.options.token.is_empty() {
            request = request.header("Authorization", format!("Token {}", self.options.token));
        }

        log::debug!("[influx-client] {} {}", request.method, request.path);
        let mut response = self.transport.send(request)?;
        if response.is_success() {
            return Ok(response);
        }

        let status = response.status;
        let headers = std::mem::take(&mut response.headers);
        let body = response.into_string().unwrap_or_default();
        Err(InfluxError::from_response(status, &headers, &body).into())
    }

    /// Resolve a required parameter from the call site or the client default.
    pub(crate) fn require<'a>(
        name: &str,
        explicit: Option<&'a str>,
        default: Option<&'a str>,
    ) -> Result<&'a str> {
        explicit
            .or(default)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "The '{}' should be defined as argument or default option",
                    name
                ))
            })
    }

    pub(crate) fn post_write(&self, key: &BatchItemKey, body: &str) -> Result<()> {
        let request = HttpRequest::post("/api/v2/write")
            .query("bucket", key.bucket.as_str())
            .query("org", key.org.as_str())
            .query("precision", key.precision.as_str())
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body);
        self.send(request).map(drop)
    }
}

impl BatchWriter for ApiContext {
    fn write_batch(&self, key: &BatchItemKey, body: &str) -> Result<()> {
        self.post_write(key, body)
    }
}

/// Result of [`InfluxClient::ping`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ping {
    /// `ok` or `fail`.
    pub status: String,
    pub build: Option<String>,
    pub version: Option<String>,
    /// Failure reason when `status` is `fail`.
    pub message: Option<String>,
}

impl Ping {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: Option<String>,
    /// `pass` or `fail`.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub checks: Vec<HealthCheck>,
}

impl HealthCheck {
    fn failed(message: String) -> Self {
        Self {
            name: "influxdb".to_string(),
            message: Some(message),
            status: "fail".to_string(),
            ..Default::default()
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == "pass"
    }
}

/// InfluxDB v2 client.
///
/// ```no_run
/// use influx_client::{ClientOptions, InfluxClient, Point};
///
/// let options = ClientOptions::new("http://localhost:8086", "my-token")
///     .org("my-org")
///     .bucket("my-bucket");
/// let client = InfluxClient::new(options)?;
///
/// let write_api = client.write_api()?;
/// write_api.write(Point::new("h2o").add_tag("location", "europe").add_field("level", 2))?;
///
/// let tables = client.query_api().query("from(bucket: \"my-bucket\") |> range(start: -1h)", None)?;
/// println!("{} tables", tables.len());
///
/// client.close();
/// # Ok::<(), influx_client::Error>(())
/// ```
pub struct InfluxClient {
    context: Arc<ApiContext>,
    write_apis: Mutex<Vec<Weak<WriteApiInner>>>,
    closed: AtomicBool,
}

impl InfluxClient {
    /// Client over the default HTTP transport.
    pub fn new(options: ClientOptions) -> Result<Self> {
        options.validate()?;
        let transport = Arc::new(ReqwestTransport::new(&options)?);
        Self::with_transport(options, transport)
    }

    /// Client over a caller-supplied transport.
    pub fn with_transport(options: ClientOptions, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            context: Arc::new(ApiContext { options, transport }),
            write_apis: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.context.options
    }

    /// Write API configured by [`ClientOptions::write`].
    pub fn write_api(&self) -> Result<WriteApi> {
        self.write_api_with(self.context.options.write.clone(), PointSettings::default())
    }

    /// Write API with explicit options and default tags.
    pub fn write_api_with(
        &self,
        write_options: WriteOptions,
        point_settings: PointSettings,
    ) -> Result<WriteApi> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        write_options.validate()?;

        let api = WriteApi::new(Arc::clone(&self.context), write_options, point_settings);
        let mut apis = self.write_apis.lock();
        apis.retain(|w| w.strong_count() > 0);
        apis.push(api.downgrade());
        Ok(api)
    }

    pub fn query_api(&self) -> QueryApi {
        QueryApi::new(Arc::clone(&self.context))
    }

    pub fn delete_api(&self) -> DeleteApi {
        DeleteApi::new(Arc::clone(&self.context))
    }

    /// `GET /ping`. Failures are reported in the returned status.
    pub fn ping(&self) -> Ping {
        match self.context.send(HttpRequest::get("/ping")) {
            Ok(response) => Ping {
                status: "ok".to_string(),
                build: response.header("X-Influxdb-Build").map(str::to_string),
                version: response.header("X-Influxdb-Version").map(str::to_string),
                message: None,
            },
            Err(e) => Ping {
                status: "fail".to_string(),
                build: None,
                version: None,
                message: Some(e.to_string()),
            },
        }
    }

    /// `GET /health`. Failures are reported in the returned status.
    pub fn health(&self) -> HealthCheck {
        let result = self
            .context
            .send(HttpRequest::get("/health"))
            .and_then(HttpResponse::into_string)
            .and_then(|body| serde_json::from_str::<HealthCheck>(&body).map_err(Error::from));
        match result {
            Ok(health) => health,
            Err(e) => HealthCheck::failed(e.to_string()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close every write API created by this client, flushing queued data.
    ///
    /// Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let apis: Vec<Weak<WriteApiInner>> = std::mem::take(&mut *self.write_apis.lock());
        for api in apis.iter().filter_map(Weak::upgrade) {
            api.close();
        }
        log::debug!("[influx-client] Closed");
    }
}

impl Drop for InfluxClient {
    fn drop(&mut self) {
        self.close();
    }
}
