// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Write API.
//!
//! Resolves payloads into line-protocol lines keyed by bucket, org and
//! precision, then either sends them right away (synchronous mode) or hands
//! them to the batching [`Worker`].

use crate::client::ApiContext;
use crate::error::{Error, Result};
use crate::mapping::point_from_json;
use crate::options::{resolve_tags, PointSettings, WriteMode, WriteOptions};
use crate::point::{Point, WritePrecision};
use crate::worker::{group_by_key, BatchItem, BatchItemKey, ErrorCallback, Worker};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Data accepted by [`WriteApi::write`].
#[derive(Debug, Clone, PartialEq)]
pub enum WritePayload {
    /// Raw line protocol, sent unchanged.
    Line(String),
    Structured(Point),
    /// JSON field map, see [`crate::mapping`].
    Record(serde_json::Value),
    Batch(Vec<WritePayload>),
}

impl From<&str> for WritePayload {
    fn from(v: &str) -> Self {
        WritePayload::Line(v.to_string())
    }
}

impl From<String> for WritePayload {
    fn from(v: String) -> Self {
        WritePayload::Line(v)
    }
}

impl From<Point> for WritePayload {
    fn from(v: Point) -> Self {
        WritePayload::Structured(v)
    }
}

impl From<serde_json::Value> for WritePayload {
    fn from(v: serde_json::Value) -> Self {
        WritePayload::Record(v)
    }
}

impl<T: Into<WritePayload>> From<Vec<T>> for WritePayload {
    fn from(v: Vec<T>) -> Self {
        WritePayload::Batch(v.into_iter().map(Into::into).collect())
    }
}

/// Per-call destination overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteParams {
    pub bucket: Option<String>,
    pub org: Option<String>,
    pub precision: Option<WritePrecision>,
}

impl WriteParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }

    pub fn precision(mut self, precision: WritePrecision) -> Self {
        self.precision = Some(precision);
        self
    }
}

pub(crate) struct WriteApiInner {
    context: Arc<ApiContext>,
    options: WriteOptions,
    /// Client tags overlaid with the API's point settings, unresolved.
    default_tags: BTreeMap<String, String>,
    worker: Option<Worker>,
    on_error: RwLock<Option<ErrorCallback>>,
    closed: AtomicBool,
}

impl WriteApiInner {
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(worker) = &self.worker {
            worker.close();
        }
        log::debug!("[influx-write] Write API closed");
    }

    fn report(&self, key: &BatchItemKey, error: &Error) {
        let callback = self.on_error.read().clone();
        if let Some(callback) = callback {
            callback(key, error);
        }
    }
}

impl Drop for WriteApiInner {
    fn drop(&mut self) {
        self.close();
    }
}

/// Handle to a write API. Clones share the same queue; the API closes when
/// the last handle is dropped or the owning client is closed.
#[derive(Clone)]
pub struct WriteApi {
    inner: Arc<WriteApiInner>,
}

impl WriteApi {
    pub(crate) fn new(
        context: Arc<ApiContext>,
        options: WriteOptions,
        point_settings: PointSettings,
    ) -> Self {
        let mut default_tags = context.options.tags.clone();
        default_tags.extend(point_settings.default_tags);

        let worker = match options.mode {
            WriteMode::Synchronous => None,
            WriteMode::Batching => Some(Worker::new(&options, context.clone())),
        };

        Self {
            inner: Arc::new(WriteApiInner {
                context,
                options,
                default_tags,
                worker,
                on_error: RwLock::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<WriteApiInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn options(&self) -> &WriteOptions {
        &self.inner.options
    }

    /// Write to the client's default bucket, org and precision.
    pub fn write(&self, payload: impl Into<WritePayload>) -> Result<()> {
        self.write_with(payload, &WriteParams::default())
    }

    /// Write with per-call overrides.
    ///
    /// In batching mode a terminal failure of an earlier batch, reported
    /// because `abort_on_exception` is set, is returned here and `payload`
    /// is not queued.
    pub fn write_with(&self, payload: impl Into<WritePayload>, params: &WriteParams) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if let Some(error) = self.take_error() {
            return Err(error);
        }

        let defaults = &self.inner.context.options;
        let bucket = ApiContext::require("bucket", params.bucket.as_deref(), defaults.bucket.as_deref())?;
        let org = ApiContext::require("org", params.org.as_deref(), defaults.org.as_deref())?;
        let precision = params.precision.unwrap_or(defaults.precision);

        let target = Target {
            bucket,
            org,
            precision,
            default_tags: resolve_tags(&self.inner.default_tags),
        };
        let mut items = Vec::new();
        target.collect(payload.into(), &mut items)?;
        if items.is_empty() {
            return Ok(());
        }

        match &self.inner.worker {
            Some(worker) => worker.push_all(items),
            None => self.write_sync(items),
        }
    }

    fn write_sync(&self, items: Vec<BatchItem>) -> Result<()> {
        for (key, lines) in group_by_key(items) {
            log::debug!(
                "[influx-write] Writing {} lines to bucket={} org={}",
                lines.len(),
                key.bucket,
                key.org
            );
            if let Err(e) = self.inner.context.post_write(&key, &lines.join("\n")) {
                self.inner.report(&key, &e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Send everything queued so far. No-op in synchronous mode.
    pub fn flush(&self) -> Result<()> {
        if let Some(worker) = &self.inner.worker {
            worker.flush_all();
        }
        match self.take_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Stop background flushing and send what is still queued. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Oldest unreported terminal batch failure.
    pub fn take_error(&self) -> Option<Error> {
        self.inner.worker.as_ref().and_then(Worker::take_error)
    }

    /// Observe every terminal write failure, in both modes.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&BatchItemKey, &Error) + Send + Sync + 'static,
    {
        let callback: ErrorCallback = Arc::new(callback);
        if let Some(worker) = &self.inner.worker {
            worker.set_error_callback(Arc::clone(&callback));
        }
        *self.inner.on_error.write() = Some(callback);
    }
}

/// Resolved destination of one write call.
struct Target<'a> {
    bucket: &'a str,
    org: &'a str,
    precision: WritePrecision,
    default_tags: BTreeMap<String, String>,
}

impl Target<'_> {
    fn key(&self, precision: WritePrecision) -> BatchItemKey {
        BatchItemKey::new(self.bucket, self.org, precision)
    }

    fn collect(&self, payload: WritePayload, out: &mut Vec<BatchItem>) -> Result<()> {
        match payload {
            WritePayload::Line(line) => {
                if !line.is_empty() {
                    out.push(BatchItem::new(self.key(self.precision), line));
                }
            }
            WritePayload::Structured(point) => self.push_point(&point, out),
            WritePayload::Record(record) => self.push_point(&point_from_json(&record)?, out),
            WritePayload::Batch(payloads) => {
                for payload in payloads {
                    self.collect(payload, out)?;
                }
            }
        }
        Ok(())
    }

    fn push_point(&self, point: &Point, out: &mut Vec<BatchItem>) {
        let precision = point.precision().unwrap_or(self.precision);
        if let Some(line) = point.to_line_protocol_with(precision, Some(&self.default_tags)) {
            out.push(BatchItem::new(self.key(precision), line));
        }
    }
}
