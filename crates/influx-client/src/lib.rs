// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB v2 client
//!
//! This crate provides:
//! - Line protocol encoding of [`Point`]s with escaping and precision scaling
//! - Synchronous or batched writes, grouped by bucket, org and precision
//! - Exponential backoff with jitter and `Retry-After` support
//! - Flux queries decoded from annotated CSV, materialized or streamed
//! - Delete by predicate, `/ping` and `/health`
//! - YAML configuration with `${env.NAME}` default tags
//!
//! # Overview
//!
//! ```text
//! Point / line / JSON --> WriteApi --> Worker (batching) --> WriteRetry --> POST /api/v2/write
//! POST /api/v2/query --> CsvRowReader --> FluxCsvParser --> FluxTable | FluxRecordStream
//! ```
//!
//! HTTP goes through the [`HttpTransport`] trait; [`InfluxClient::new`] uses
//! a blocking `reqwest` client, [`InfluxClient::with_transport`] accepts any
//! other implementation.

pub mod client;
pub mod config;
pub mod delete_api;
pub mod error;
pub mod flux;
pub mod mapping;
pub mod options;
pub mod point;
pub mod query_api;
pub mod retry;
pub mod transport;
pub mod worker;
pub mod write_api;

pub use client::{HealthCheck, InfluxClient, Ping, USER_AGENT};
pub use config::ClientOptions;
pub use delete_api::{DeleteApi, TimeBound};
pub use error::{Error, InfluxError, Result};
pub use flux::{FluxColumn, FluxRecord, FluxRecordStream, FluxTable, FluxValue};
pub use options::{PointSettings, WriteMode, WriteOptions};
pub use point::{FieldValue, Point, Timestamp, WritePrecision};
pub use query_api::{Dialect, Query, QueryApi};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method};
pub use worker::BatchItemKey;
pub use write_api::{WriteApi, WriteParams, WritePayload};
