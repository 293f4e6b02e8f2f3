// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Delete-by-predicate API (`POST /api/v2/delete`).

use crate::client::ApiContext;
use crate::error::{Error, Result};
use crate::transport::HttpRequest;
use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, TimeZone};
use serde::Serialize;
use std::sync::Arc;

/// Start or stop of a delete range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeBound {
    Instant(DateTime<FixedOffset>),
    /// RFC3339 text, validated before sending.
    Text(String),
}

impl TimeBound {
    fn to_rfc3339(&self) -> Result<String> {
        match self {
            TimeBound::Instant(t) => Ok(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            TimeBound::Text(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(_) => Ok(s.clone()),
                Err(e) => Err(Error::Config(format!("invalid RFC3339 time '{}': {}", s, e))),
            },
        }
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for TimeBound {
    fn from(t: DateTime<Tz>) -> Self {
        let offset = t.offset().fix();
        TimeBound::Instant(t.with_timezone(&offset))
    }
}

impl From<&str> for TimeBound {
    fn from(s: &str) -> Self {
        TimeBound::Text(s.to_string())
    }
}

impl From<String> for TimeBound {
    fn from(s: String) -> Self {
        TimeBound::Text(s)
    }
}

#[derive(Debug, Serialize)]
struct DeletePredicateRequest {
    start: String,
    stop: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    predicate: Option<String>,
}

/// Delete API bound to one client.
#[derive(Clone)]
pub struct DeleteApi {
    context: Arc<ApiContext>,
}

impl DeleteApi {
    pub(crate) fn new(context: Arc<ApiContext>) -> Self {
        Self { context }
    }

    /// Delete points in `[start, stop]` matching `predicate`, e.g.
    /// `_measurement="h2o" AND location="europe"`. Not retried.
    pub fn delete(
        &self,
        start: impl Into<TimeBound>,
        stop: impl Into<TimeBound>,
        predicate: Option<&str>,
        bucket: Option<&str>,
        org: Option<&str>,
    ) -> Result<()> {
        let options = &self.context.options;
        let bucket = ApiContext::require("bucket", bucket, options.bucket.as_deref())?;
        let org = ApiContext::require("org", org, options.org.as_deref())?;

        let body = DeletePredicateRequest {
            start: start.into().to_rfc3339()?,
            stop: stop.into().to_rfc3339()?,
            predicate: predicate.filter(|p| !p.is_empty()).map(str::to_string),
        };

        let request = HttpRequest::post("/api/v2/delete")
            .query("org", org)
            .query("bucket", bucket)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&body)?);
        self.context.send(request).map(drop)
    }
}
