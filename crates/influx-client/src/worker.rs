// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Background batching of line-protocol writes.
//!
//! Producers push [`BatchItem`]s onto a lock-free queue. Two named threads
//! drain it:
//! - the size thread polls every 10 ms and drains once `batch_size` lines
//!   are waiting,
//! - the flush thread drains whatever is queued every `flush_interval`.
//!
//! A drain pops at most `batch_size` items, groups them by
//! [`BatchItemKey`] and submits one request per key through [`WriteRetry`].
//! Drains are serialized by a single gate, so lines sharing a key reach
//! the server in push order.

use crate::error::{Error, Result};
use crate::options::WriteOptions;
use crate::point::WritePrecision;
use crate::retry::WriteRetry;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use crossbeam::queue::SegQueue;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Size trigger polling period.
const SIZE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Destination of a batched line. Lines with equal keys share a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchItemKey {
    pub bucket: String,
    pub org: String,
    pub precision: WritePrecision,
}

impl BatchItemKey {
    pub fn new(bucket: impl Into<String>, org: impl Into<String>, precision: WritePrecision) -> Self {
        Self {
            bucket: bucket.into(),
            org: org.into(),
            precision,
        }
    }
}

/// One encoded line waiting for a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub key: BatchItemKey,
    pub data: String,
}

impl BatchItem {
    pub fn new(key: BatchItemKey, data: impl Into<String>) -> Self {
        Self {
            key,
            data: data.into(),
        }
    }
}

/// Sends one request body for one key.
pub trait BatchWriter: Send + Sync {
    fn write_batch(&self, key: &BatchItemKey, body: &str) -> Result<()>;
}

/// Observer of terminal batch failures.
pub type ErrorCallback = Arc<dyn Fn(&BatchItemKey, &Error) + Send + Sync>;

struct Shared {
    queue: SegQueue<BatchItem>,
    /// At most one drain in flight.
    gate: Mutex<()>,
    batch_size: usize,
    abort_on_exception: bool,
    retry: WriteRetry,
    writer: Arc<dyn BatchWriter>,
    error_tx: Sender<Error>,
    error_rx: Receiver<Error>,
    on_error: RwLock<Option<ErrorCallback>>,
}

impl Shared {
    /// Pop up to `batch_size` items and submit them. With `only_if_full`
    /// the drain is skipped unless a full batch is waiting.
    fn drain(&self, only_if_full: bool) -> usize {
        let _gate = self.gate.lock();

        if only_if_full && self.queue.len() < self.batch_size {
            return 0;
        }

        let mut items = Vec::with_capacity(self.batch_size.min(self.queue.len()));
        while items.len() < self.batch_size {
            match self.queue.pop() {
                Some(item) => items.push(item),
                None => break,
            }
        }
        let count = items.len();

        for (key, lines) in group_by_key(items) {
            self.submit(&key, &lines.join("\n"), lines.len());
        }
        count
    }

    fn submit(&self, key: &BatchItemKey, body: &str, lines: usize) {
        let jitter = self.retry.jitter_delay();
        if !jitter.is_zero() {
            thread::sleep(jitter);
        }

        log::debug!(
            "[influx-worker] Flushing {} lines to bucket={} org={} precision={}",
            lines,
            key.bucket,
            key.org,
            key.precision
        );

        if let Err(e) = self.retry.retry(|_| self.writer.write_batch(key, body)) {
            self.report(key, e);
        }
    }

    fn report(&self, key: &BatchItemKey, error: Error) {
        let callback = self.on_error.read().clone();
        if let Some(callback) = callback {
            callback(key, &error);
        }

        if self.abort_on_exception {
            log::error!(
                "[influx-worker] Batch for bucket={} org={} failed: {}",
                key.bucket,
                key.org,
                error
            );
            let _ = self.error_tx.send(error);
        } else {
            log::error!(
                "[influx-worker] Dropping batch for bucket={} org={}: {}",
                key.bucket,
                key.org,
                error
            );
        }
    }

    fn flush_all(&self) {
        while !self.queue.is_empty() {
            self.drain(false);
        }
    }
}

/// Group items by key in order of first appearance, keeping push order
/// within each key.
pub(crate) fn group_by_key(items: Vec<BatchItem>) -> Vec<(BatchItemKey, Vec<String>)> {
    let mut groups: Vec<(BatchItemKey, Vec<String>)> = Vec::new();
    let mut index: HashMap<BatchItemKey, usize> = HashMap::new();

    for item in items {
        match index.get(&item.key) {
            Some(&i) => groups[i].1.push(item.data),
            None => {
                index.insert(item.key.clone(), groups.len());
                groups.push((item.key, vec![item.data]));
            }
        }
    }
    groups
}

/// Batching worker owning the queue and its two trigger threads.
pub struct Worker {
    shared: Arc<Shared>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    /// Held shared while enqueueing, exclusive while closing, so no push
    /// lands after the final flush.
    closed: RwLock<bool>,
}

impl Worker {
    /// Spawn the trigger threads. `options` must already be validated.
    pub fn new(options: &WriteOptions, writer: Arc<dyn BatchWriter>) -> Self {
        let (error_tx, error_rx) = channel::unbounded();
        let shared = Arc::new(Shared {
            queue: SegQueue::new(),
            gate: Mutex::new(()),
            batch_size: options.batch_size.max(1),
            abort_on_exception: options.abort_on_exception,
            retry: WriteRetry::new(options),
            writer,
            error_tx,
            error_rx,
            on_error: RwLock::new(None),
        });

        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);
        let flush_interval = options.flush_interval().max(Duration::from_millis(1));

        let flush_thread = {
            let shared = Arc::clone(&shared);
            let shutdown_rx = shutdown_rx.clone();
            #[allow(clippy::expect_used)] // thread spawn failure is unrecoverable
            let handle = thread::Builder::new()
                .name("influx-flush".to_string())
                .spawn(move || loop {
                    match shutdown_rx.recv_timeout(flush_interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            shared.drain(false);
                        }
                        _ => break,
                    }
                })
                .expect("Failed to spawn influx flush thread");
            handle
        };

        let size_thread = {
            let shared = Arc::clone(&shared);
            #[allow(clippy::expect_used)] // thread spawn failure is unrecoverable
            let handle = thread::Builder::new()
                .name("influx-batch".to_string())
                .spawn(move || loop {
                    match shutdown_rx.recv_timeout(SIZE_POLL_INTERVAL) {
                        Err(RecvTimeoutError::Timeout) => {
                            if shared.queue.len() >= shared.batch_size {
                                shared.drain(true);
                            }
                        }
                        _ => break,
                    }
                })
                .expect("Failed to spawn influx batch thread");
            handle
        };

        log::debug!(
            "[influx-worker] Started (batch_size={}, flush_interval={}ms)",
            options.batch_size,
            flush_interval.as_millis()
        );

        Self {
            shared,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            threads: Mutex::new(vec![flush_thread, size_thread]),
            closed: RwLock::new(false),
        }
    }

    /// Queue one item.
    pub fn push(&self, item: BatchItem) -> Result<()> {
        let closed = self.closed.read();
        if *closed {
            return Err(Error::Closed);
        }
        self.shared.queue.push(item);
        Ok(())
    }

    /// Queue several items in order.
    pub fn push_all(&self, items: impl IntoIterator<Item = BatchItem>) -> Result<()> {
        let closed = self.closed.read();
        if *closed {
            return Err(Error::Closed);
        }
        for item in items {
            self.shared.queue.push(item);
        }
        Ok(())
    }

    /// Drain until the queue is empty. Blocks through any retries.
    pub fn flush_all(&self) {
        self.shared.flush_all();
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    /// Oldest unreported terminal failure (only with `abort_on_exception`).
    pub fn take_error(&self) -> Option<Error> {
        self.shared.error_rx.try_recv().ok()
    }

    /// Install the failure observer, replacing any previous one.
    pub fn set_error_callback(&self, callback: ErrorCallback) {
        *self.shared.on_error.write() = Some(callback);
    }

    /// Stop the trigger threads and flush everything still queued.
    ///
    /// Idempotent; only the first call does any work.
    pub fn close(&self) {
        {
            let mut closed = self.closed.write();
            if *closed {
                return;
            }
            *closed = true;
        }

        drop(self.shutdown_tx.lock().take());
        let threads: Vec<JoinHandle<()>> = std::mem::take(&mut *self.threads.lock());
        for handle in threads {
            let name = handle.thread().name().unwrap_or("influx-worker").to_string();
            if handle.join().is_err() {
                log::error!("[influx-worker] Thread {} panicked", name);
            }
        }

        let remaining = self.shared.queue.len();
        if remaining > 0 {
            log::debug!("[influx-worker] Flushing {} queued lines on close", remaining);
        }
        self.shared.flush_all();
        log::debug!("[influx-worker] Stopped");
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.close();
    }
}
